use assert2::check;
use std::path::Path;

use super::*;

#[test]
fn is_remote_recognizes_http_and_https() {
    check!(is_remote("http://repo.example/current"));
    check!(is_remote("https://repo.example/current"));
    check!(!is_remote("/srv/repo/current"));
    check!(!is_remote("file:///srv/repo/current"));
}

#[test]
fn cached_archive_and_signature_paths() {
    let cachedir = Path::new("/var/cache/xbps");
    check!(cached_archive_path(cachedir, "foo-1.0_1", "x86_64") == cachedir.join("foo-1.0_1.x86_64.xbps"));
    check!(
        cached_signature_path(cachedir, "foo-1.0_1", "x86_64")
        == cachedir.join("foo-1.0_1.x86_64.xbps.sig")
    );
}

#[test]
fn local_fetcher_reads_file_url_and_bare_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob");
    std::fs::write(&path, b"hello").unwrap();

    let mut fetcher = LocalFetcher;
    let FetchResult::Fresh(bytes) = fetcher.fetch(path.to_str().unwrap(), None).unwrap() else {
        panic!("expected Fresh");
    };
    check!(bytes == b"hello");

    let url = format!("file://{}", path.display());
    let FetchResult::Fresh(bytes) = fetcher.fetch(&url, None).unwrap() else {
        panic!("expected Fresh");
    };
    check!(bytes == b"hello");
}

#[test]
fn local_fetcher_missing_file_errors() {
    let mut fetcher = LocalFetcher;
    check!(fetcher.fetch("/nonexistent/path/to/nothing", None).is_err());
}
