//! End-to-end scenarios from the batch-reader protocol's testable properties:
//! empty batches, back-to-back changesets, forward-reference rejection, JSON
//! quota enforcement, and the async reader driven over a `tokio` source.

use std::io::Cursor;

use odata_batch::error::Error;
use odata_batch::reader::{AsyncBatchReader, BatchReader, ReaderState};
use odata_batch::settings::BatchReaderSettings;

fn mime_body(parts: &[&str]) -> Vec<u8> {
    parts.concat().into_bytes()
}

#[test]
fn empty_json_array_completes_immediately() {
    let body = br#"{"requests":[]}"#.to_vec();
    let mut reader =
        BatchReader::open_request(Cursor::new(body), "application/json", BatchReaderSettings::new())
            .unwrap();
    assert!(!reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::Completed);
}

#[test]
fn changeset_with_zero_operations_emits_start_then_end() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
        "\r\n",
        "--changeset_1--\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .unwrap();

    assert!(reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::ChangesetStart);
    assert!(reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::ChangesetEnd);
    assert!(!reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::Completed);
}

#[test]
fn back_to_back_json_changesets_have_no_intervening_operation() {
    let body = br#"{"requests":[
        {"id":"r1","method":"POST","url":"/A","atomicityGroup":"g1"},
        {"id":"r2","method":"POST","url":"/B","atomicityGroup":"g2"}
    ]}"#
    .to_vec();
    let mut reader =
        BatchReader::open_request(Cursor::new(body), "application/json", BatchReaderSettings::new())
            .unwrap();

    let mut states = Vec::new();
    while reader.advance().unwrap() {
        states.push(reader.state());
        if reader.state() == ReaderState::Operation {
            reader.create_operation_request().unwrap();
        }
    }
    states.push(reader.state());

    assert_eq!(
        states,
        vec![
            ReaderState::ChangesetStart,
            ReaderState::Operation,
            ReaderState::ChangesetEnd,
            ReaderState::ChangesetStart,
            ReaderState::Operation,
            ReaderState::ChangesetEnd,
            ReaderState::Completed,
        ]
    );
}

#[test]
fn json_forward_reference_rejected_at_emission() {
    let body = br#"{"requests":[
        {"id":"r1","method":"POST","url":"/A","dependsOn":["rLater"]},
        {"id":"rLater","method":"POST","url":"/B"}
    ]}"#
    .to_vec();
    let mut reader =
        BatchReader::open_request(Cursor::new(body), "application/json", BatchReaderSettings::new())
            .unwrap();

    assert!(reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::Operation);
    let err = reader.create_operation_request().unwrap_err();
    assert!(matches!(err, Error::ForwardReferenceNotAllowed(ref id) if id == "rLater"));
}

#[test]
fn duplicate_content_id_in_changeset_rejected() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
        "\r\n",
        "--changeset_1\r\n",
        "Content-Type: application/http\r\n",
        "Content-ID: 1\r\n",
        "\r\n",
        "POST /A HTTP/1.1\r\n",
        "\r\n",
        "\r\n--changeset_1\r\n",
        "Content-Type: application/http\r\n",
        "Content-ID: 1\r\n",
        "\r\n",
        "POST /B HTTP/1.1\r\n",
        "\r\n",
        "\r\n--changeset_1--\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .unwrap();

    reader.advance().unwrap(); // ChangesetStart
    reader.advance().unwrap(); // Operation (1)
    reader.create_operation_request().unwrap();
    reader.advance().unwrap(); // Operation (1 again)
    let err = reader.create_operation_request().unwrap_err();
    assert!(matches!(err, Error::DuplicateContentId(ref id) if id == "1"));
}

#[test]
fn missing_content_id_in_changeset_rejected() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
        "\r\n",
        "--changeset_1\r\n",
        "Content-Type: application/http\r\n",
        "\r\n",
        "POST /A HTTP/1.1\r\n",
        "\r\n",
        "\r\n--changeset_1--\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .unwrap();
    reader.advance().unwrap();
    reader.advance().unwrap();
    let err = reader.create_operation_request().unwrap_err();
    assert!(matches!(err, Error::MissingContentId));
}

#[test]
fn nested_changeset_rejected() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
        "\r\n",
        "--changeset_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_2\r\n",
        "\r\n",
        "--changeset_1--\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .unwrap();
    reader.advance().unwrap(); // ChangesetStart
    let err = reader.advance().unwrap_err();
    assert!(matches!(err, Error::NestedChangesetNotAllowed));
    assert_eq!(reader.state(), ReaderState::Exception);
}

#[test]
fn exception_state_is_terminal() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
        "\r\n",
        "--changeset_1\r\n",
        "Content-Type: multipart/mixed; boundary=changeset_2\r\n",
        "\r\n",
        "--changeset_1--\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .unwrap();
    reader.advance().unwrap();
    assert!(reader.advance().is_err());
    let err = reader.advance().unwrap_err();
    assert!(matches!(err, Error::InvalidReaderState));
}

#[test]
fn json_quota_exceeded_on_third_group_operation() {
    let body = br#"{"requests":[
        {"id":"r1","method":"POST","url":"/A","atomicityGroup":"g1"},
        {"id":"r2","method":"POST","url":"/B","atomicityGroup":"g1"},
        {"id":"r3","method":"POST","url":"/C","atomicityGroup":"g1"}
    ]}"#
    .to_vec();
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "application/json",
        BatchReaderSettings::new().max_operations_per_changeset(2),
    )
    .unwrap();

    assert!(reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::ChangesetStart);
    reader.advance().unwrap();
    reader.create_operation_request().unwrap();
    reader.advance().unwrap();
    reader.create_operation_request().unwrap();
    let err = reader.advance().unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));
}

#[test]
fn json_quota_exceeded_on_parts_per_batch() {
    let body =
        br#"{"requests":[{"id":"r1","method":"GET","url":"/A"},{"id":"r2","method":"GET","url":"/B"}]}"#
            .to_vec();
    let mut reader = BatchReader::open_request(
        Cursor::new(body),
        "application/json",
        BatchReaderSettings::new().max_parts_per_batch(1),
    )
    .unwrap();
    reader.advance().unwrap();
    reader.create_operation_request().unwrap();
    let err = reader.advance().unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));
}

#[test]
fn json_response_batch_round_trips_body_and_synthesizes_id() {
    let body = br#"{"responses":[
        {"status":204},
        {"id":"r2","status":200,"headers":{"Content-Type":"application/json"},"body":{"value":[]}}
    ]}"#
    .to_vec();
    let mut reader =
        BatchReader::open_response(Cursor::new(body), "application/json", BatchReaderSettings::new())
            .unwrap();

    assert!(reader.advance().unwrap());
    let msg = reader.create_operation_response().unwrap();
    assert_eq!(msg.status(), 204);
    assert!(msg.content_id().is_some());
    drop(msg);

    assert!(reader.advance().unwrap());
    let msg = reader.create_operation_response().unwrap();
    assert_eq!(msg.status(), 200);
    assert_eq!(msg.content_id(), Some("r2"));
    let mut stream = msg.open_body();
    let bytes = stream.read_to_end().unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["value"], serde_json::json!([]));
    drop(stream);

    assert!(!reader.advance().unwrap());
}

struct AsyncCursor {
    data: Vec<u8>,
    pos: usize,
}

#[async_trait::async_trait]
impl odata_batch::source::AsyncByteSource for AsyncCursor {
    async fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        let chunk = &self.data[self.pos..];
        let take = chunk.len().min(16);
        buf.extend_from_slice(&chunk[..take]);
        self.pos += take;
        Ok(take)
    }
}

#[tokio::test]
async fn async_reader_matches_sync_reader_over_same_payload() {
    let body = mime_body(&[
        "--batch_1\r\n",
        "Content-Type: application/http\r\n",
        "\r\n",
        "GET /Customers HTTP/1.1\r\n",
        "\r\n",
        "--batch_1--\r\n",
    ]);
    let mut reader = AsyncBatchReader::open_request(
        AsyncCursor { data: body, pos: 0 },
        "multipart/mixed; boundary=batch_1",
        BatchReaderSettings::new(),
    )
    .await
    .unwrap();

    assert!(reader.advance().await.unwrap());
    assert_eq!(reader.state(), ReaderState::Operation);
    let msg = reader.create_operation_request().unwrap();
    assert_eq!(msg.uri(), "/Customers");
    let mut stream = msg.open_body_async();
    assert!(stream.read_to_end().await.unwrap().is_empty());
    drop(stream);

    assert!(!reader.advance().await.unwrap());
    assert_eq!(reader.state(), ReaderState::Completed);
}
