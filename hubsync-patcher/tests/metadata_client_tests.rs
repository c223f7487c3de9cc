//! `MetadataClient` against a local mock server.

use std::thread;
use std::time::Duration;

use hubsync_core::{DepotId, ManifestId, PackageId};
use hubsync_patcher::{MetadataClient, MetadataError, MetadataLookup, MetadataSource};
use tiny_http::{Response, Server, StatusCode};

/// Answers every request with `status` and `body` until idle.
fn serve(status: u16, body: &'static str) -> String {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let base = format!("http://{}", server.server_addr());
    thread::spawn(move || loop {
        let req = match server.recv_timeout(Duration::from_millis(500)) {
            Ok(Some(req)) => req,
            Ok(None) | Err(_) => break,
        };
        let _ = req.respond(Response::from_string(body).with_status_code(StatusCode(status)));
    });
    base
}

fn pkg(id: &str) -> PackageId {
    PackageId::parse(id).expect("id")
}

#[test]
fn success_response_yields_depot_map() {
    let base = serve(
        200,
        r#"{"status":"success","data":{"123":{"depots":{"10":{"manifests":{"public":{"gid":"BBB"}}}}}}}"#,
    );
    let client = MetadataClient::new(base, Duration::from_secs(5));
    let lookup = client.lookup(&pkg("123")).expect("lookup");
    let expected = [(DepotId::from("10"), ManifestId::from("BBB"))].into_iter().collect();
    assert_eq!(lookup, MetadataLookup::Found(expected));
}

#[test]
fn http_404_is_not_found() {
    let base = serve(404, "nope");
    let client = MetadataClient::new(base, Duration::from_secs(5));
    let err = client.lookup(&pkg("789")).unwrap_err();
    assert!(matches!(err, MetadataError::NotFound { .. }), "got: {err}");
}

#[test]
fn server_errors_are_transient() {
    let base = serve(503, "busy");
    let client = MetadataClient::new(base, Duration::from_secs(5));
    let err = client.lookup(&pkg("1")).unwrap_err();
    assert!(err.is_transient(), "got: {err}");
}

#[test]
fn client_errors_are_not_retried() {
    let base = serve(400, "bad");
    let client = MetadataClient::new(base, Duration::from_secs(5));
    let err = client.lookup(&pkg("1")).unwrap_err();
    assert!(matches!(err, MetadataError::Other { .. }), "got: {err}");
    assert!(!err.is_transient());
}

#[test]
fn undecodable_body_is_malformed() {
    let base = serve(200, "<html>oops</html>");
    let client = MetadataClient::new(base, Duration::from_secs(5));
    assert_eq!(client.lookup(&pkg("1")).expect("lookup"), MetadataLookup::Malformed);
}

#[test]
fn unreachable_service_is_transient() {
    let client = MetadataClient::new("http://127.0.0.1:9", Duration::from_secs(2));
    let err = client.lookup(&pkg("1")).unwrap_err();
    assert!(err.is_transient(), "got: {err}");
}
