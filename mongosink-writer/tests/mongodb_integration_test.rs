// Copyright 2025 Mongosink Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the MongoDB writer.
//!
//! These tests require a running MongoDB instance. Start one with:
//!
//! ```bash
//! docker run -d -p 27017:27017 mongo:7
//! ```
//!
//! Then run the tests:
//!
//! ```bash
//! cargo test --package mongosink-writer --test mongodb_integration_test -- --ignored
//! ```

use bson::{doc, Document};
use mongosink_core::cdc::MongoDbCdcHandler;
use mongosink_core::config::SinkConfig;
use mongosink_core::namespace::Namespace;
use mongosink_core::pipeline::ProcessedSinkRecord;
use mongosink_core::record::{RecordPayload, SinkRecord};
use mongosink_writer::{group_by_namespace, MongoWriter, SinkWriter};
use std::env;
use std::sync::Arc;

fn mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn document_record(topic: &str, offset: i64, value: Document) -> SinkRecord {
    let key = doc! { "_id": offset };
    SinkRecord::new(
        topic,
        0,
        offset,
        RecordPayload::Document(key),
        RecordPayload::Document(value),
    )
}

async fn collection(writer_db: &str, name: &str) -> mongodb::Collection<Document> {
    let client = mongodb::Client::with_uri_str(mongodb_uri()).await.unwrap();
    client.database(writer_db).collection(name)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn replace_upsert_round_trip() {
    let db = "mongosink_it";
    let config = SinkConfig::builder().database(db).build().unwrap();
    let writer = MongoWriter::connect(&mongodb_uri()).await.unwrap();

    let coll = collection(db, "replace_round_trip").await;
    coll.drop().await.unwrap();

    let value = doc! { "_id": 1i64, "name": "Alice" };
    let processed = ProcessedSinkRecord::process(
        document_record("replace_round_trip", 1, value.clone()),
        &config,
    )
    .unwrap();

    for (namespace, ops) in group_by_namespace(&[processed]) {
        writer.write(&namespace, &ops).await.unwrap();
    }

    let stored = coll.find_one(doc! { "_id": 1i64 }).await.unwrap();
    assert_eq!(stored, Some(value));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn cdc_delete_removes_the_document() {
    let db = "mongosink_it";
    let config = SinkConfig::builder()
        .database(db)
        .cdc_handler(Arc::new(MongoDbCdcHandler::new()))
        .build()
        .unwrap();
    let writer = MongoWriter::connect(&mongodb_uri()).await.unwrap();

    let coll = collection(db, "cdc_delete").await;
    coll.drop().await.unwrap();
    coll.insert_one(doc! { "_id": 2i64, "name": "Bob" })
        .await
        .unwrap();

    let envelope = serde_json::json!({ "op": "d", "before": null, "after": null }).to_string();
    let record = SinkRecord::new(
        "cdc_delete",
        0,
        2,
        RecordPayload::String(r#"{"_id": 2}"#.to_string()),
        RecordPayload::String(envelope),
    );
    let processed = ProcessedSinkRecord::process(record, &config).unwrap();
    writer
        .write(&Namespace::new(db, "cdc_delete"), processed.write_ops())
        .await
        .unwrap();

    let remaining = coll.count_documents(doc! {}).await.unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn mixed_topics_land_in_their_own_collections() {
    let db = "mongosink_it";
    let config = SinkConfig::builder().database(db).build().unwrap();
    let writer = MongoWriter::connect(&mongodb_uri()).await.unwrap();

    for name in ["grouped_a", "grouped_b"] {
        collection(db, name).await.drop().await.unwrap();
    }

    let batch: Vec<_> = [
        ("grouped_a", 1),
        ("grouped_b", 2),
        ("grouped_a", 3),
    ]
    .into_iter()
    .map(|(topic, offset)| {
        let value = doc! { "_id": offset, "topic": topic };
        ProcessedSinkRecord::process(document_record(topic, offset, value), &config).unwrap()
    })
    .collect();

    for (namespace, ops) in group_by_namespace(&batch) {
        writer.write(&namespace, &ops).await.unwrap();
    }

    let a = collection(db, "grouped_a").await;
    let b = collection(db, "grouped_b").await;
    assert_eq!(a.count_documents(doc! {}).await.unwrap(), 2);
    assert_eq!(b.count_documents(doc! {}).await.unwrap(), 1);
}
