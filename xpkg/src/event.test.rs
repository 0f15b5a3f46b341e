use super::*;
use crate::internal::test_utils::*;

struct Recorder(Vec<Event>);

impl EventSink for Recorder {
    fn emit(&mut self, event: Event) {
        self.0.push(event);
    }
}

#[test]
fn sink_records_events_in_order() {
    let mut sink = Recorder(Vec::new());
    sink.emit(Event::FetchStart {
            pkgver: S!("foo-1.0_1"),
            url: S!("https://example.invalid/foo-1.0_1.xbps"),
    });
    sink.emit(Event::FetchEnd {
            pkgver: S!("foo-1.0_1"),
    });
    assert!(sink.0.len() == 2);
}

#[test]
fn default_sink_rejects_key_import() {
    let mut sink = TracingEventSink;
    assert!(!sink.repo_key_import("abcd", "releases@example.invalid"));
}

#[test]
fn tracing_sink_handles_every_variant_without_panicking() {
    let mut sink = TracingEventSink;
    sink.emit(Event::FetchStart {
            pkgver: S!("foo-1.0_1"),
            url: S!("https://example.invalid/foo-1.0_1.xbps"),
    });
    sink.emit(Event::FetchUpdate {
            pkgver: S!("foo-1.0_1"),
            fetched: 10,
            total: 100,
    });
    sink.emit(Event::FetchEnd {
            pkgver: S!("foo-1.0_1"),
    });
    sink.emit(Event::Verify {
            pkgver: S!("foo-1.0_1"),
    });
    sink.emit(Event::VerifyFail {
            pkgver: S!("foo-1.0_1"),
            reason: S!("bad signature"),
    });
    sink.emit(Event::UnpackFail {
            pkgver: S!("foo-1.0_1"),
            reason: S!("disk full"),
    });
    sink.emit(Event::RemoveFile {
            path: S!("/usr/bin/foo"),
            pkgname: S!("foo"),
    });
    sink.emit(Event::RemoveFileFail {
            path: S!("/usr/bin/foo"),
            pkgname: S!("foo"),
            reason: S!("permission denied"),
    });
    sink.emit(Event::AltGroupAdded {
            group: S!("editor"),
            pkgname: S!("foo"),
    });
    sink.emit(Event::AltGroupSwitched {
            group: S!("editor"),
            from: S!("foo"),
            to: S!("bar"),
    });
    sink.emit(Event::ConfigFile {
            path: S!("/etc/foo.conf"),
            action: ConfigFileAction::InstalledAsNew,
    });
    sink.emit(Event::ShowInstallMsg {
            pkgname: S!("foo"),
            message: S!("see /usr/share/doc/foo/README"),
    });
    sink.emit(Event::TransAddPkg {
            pkgver: S!("foo-1.0_1"),
            action: TransactionAction::Install,
    });
}
