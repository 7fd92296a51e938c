//! Tests for the WebDAV client
//!

use core::time::Duration;
use std::{
    fs,
    io::Read,
    net::TcpListener,
    thread,
};

use tempfile::tempdir;
use webdav_backup::{Client, STATUS_TIMEOUT, STATUS_TRANSPORT_ERROR, WebDavConfig, WebDavError};

mod common;
use common::{CannedResponse, TestServer};

fn client_for(url: &str) -> Client {
    let config = WebDavConfig {
        base_url: url.to_string(),
        upload_directory: "backups/docs".to_string(),
        username: "user".to_string(),
        password: "pass".to_string(),
    };
    Client::new(&config, Duration::from_secs(5)).unwrap()
}

#[test]
fn ensure_collection_creates_each_segment() {
    let server = TestServer::spawn(vec![CannedResponse::empty(201), CannedResponse::empty(201)]);
    let client = client_for(&server.url);

    client.ensure_collection("backups/docs").unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "MKCOL");
    assert_eq!(requests[0].path, "/backups");
    assert_eq!(requests[1].method, "MKCOL");
    assert_eq!(requests[1].path, "/backups/docs");
}

#[test]
fn ensure_collection_is_idempotent() {
    // 405 means the collection already exists.
    let server = TestServer::spawn(vec![CannedResponse::empty(405), CannedResponse::empty(405)]);
    let client = client_for(&server.url);

    client.ensure_collection("backups/docs").unwrap();
}

#[test]
fn ensure_collection_treats_redirect_as_existing() {
    let server = TestServer::spawn(vec![CannedResponse::empty(301)]);
    let client = client_for(&server.url);

    client.ensure_collection("backups").unwrap();
}

#[test]
fn ensure_collection_fails_on_other_statuses() {
    let server = TestServer::spawn(vec![CannedResponse::empty(403)]);
    let client = client_for(&server.url);

    let error = client.ensure_collection("backups").unwrap_err();
    assert!(matches!(
        error,
        WebDavError::Collection { status: 403, .. }
    ));
}

#[test]
fn upload_streams_the_file() {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("backup_20240101_010000.tar.gz");
    fs::write(&path, b"payload bytes").unwrap();

    let server = TestServer::spawn(vec![CannedResponse::empty(201)]);
    let client = client_for(&server.url);
    let url = format!("{}/backups/backup_20240101_010000.tar.gz", server.url);

    let outcome = client
        .upload(&path, &url, Duration::from_secs(5))
        .unwrap();

    assert_eq!(outcome.status, 201);
    assert_eq!(outcome.url, url);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].body, b"payload bytes");
}

#[test]
fn upload_maps_transport_failure_to_synthetic_status() {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("backup_20240101_010000.tar.gz");
    fs::write(&path, b"payload").unwrap();

    // Grab a port nothing is listening on.
    let unused = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let client = client_for(&format!("http://{unused}"));
    let outcome = client
        .upload(
            &path,
            &format!("http://{unused}/backups/file"),
            Duration::from_secs(5),
        )
        .unwrap();

    assert_eq!(outcome.status, STATUS_TRANSPORT_ERROR);
}

#[test]
fn upload_maps_timeout_to_synthetic_status() {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("backup_20240101_010000.tar.gz");
    fs::write(&path, b"payload").unwrap();

    // Accept the connection but never answer.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut sink = [0u8; 1024];
        while let Ok(read) = stream.read(&mut sink) {
            if read == 0 {
                break;
            }
        }
    });

    let client = client_for(&format!("http://{address}"));
    let outcome = client
        .upload(
            &path,
            &format!("http://{address}/backups/file"),
            Duration::from_millis(300),
        )
        .unwrap();

    assert_eq!(outcome.status, STATUS_TIMEOUT);
}

#[test]
fn head_size_reads_content_length() {
    let server = TestServer::spawn(vec![CannedResponse::with_content_length(200, 42)]);
    let client = client_for(&server.url);

    let size = client
        .head_size(&format!("{}/backups/file", server.url), Duration::from_secs(5))
        .unwrap();

    assert_eq!(size, Some(42));
    assert_eq!(server.requests()[0].method, "HEAD");
}

#[test]
fn head_size_is_unknown_without_content_length() {
    let server = TestServer::spawn(vec![CannedResponse::empty(200)]);
    let client = client_for(&server.url);

    let size = client
        .head_size(&format!("{}/backups/file", server.url), Duration::from_secs(5))
        .unwrap();

    assert_eq!(size, None);
}

#[test]
fn list_collection_returns_the_raw_body() {
    let body = b"<html><a href=\"backup_20240101_010000.tar.gz\">x</a></html>";
    let server = TestServer::spawn(vec![CannedResponse::with_body(200, body)]);
    let client = client_for(&server.url);

    let listing = client
        .list_collection(&client.collection_url("backups/docs"), Duration::from_secs(5))
        .unwrap();

    assert_eq!(listing.as_bytes(), body);
    assert_eq!(server.requests()[0].path, "/backups/docs/");
}

#[test]
fn delete_failures_are_swallowed() {
    let server = TestServer::spawn(vec![CannedResponse::empty(423)]);
    let client = client_for(&server.url);

    // Only logs, no panic, no error.
    client.delete(&format!("{}/backups/file", server.url));
    assert_eq!(server.requests()[0].method, "DELETE");

    // A dead endpoint is just as silent.
    let unused = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let dead = client_for(&format!("http://{unused}"));
    dead.delete(&format!("http://{unused}/backups/file"));
}

#[test]
fn urls_are_joined_without_duplicate_slashes() {
    let config = WebDavConfig {
        base_url: "https://dav.example.com/".to_string(),
        upload_directory: "backups/docs".to_string(),
        username: "user".to_string(),
        password: "pass".to_string(),
    };
    let client = Client::new(&config, Duration::from_secs(5)).unwrap();

    assert_eq!(
        client.collection_url("/backups/docs/"),
        "https://dav.example.com/backups/docs/"
    );
    assert_eq!(
        client.file_url("backups/docs", "backup_20240101_010000.zip"),
        "https://dav.example.com/backups/docs/backup_20240101_010000.zip"
    );
}
