use std::io::Write as _;

use indoc::indoc;
use tempfile::tempdir;

use super::*;
use crate::internal::test_utils::*;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn parses_simple_keys() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        "xbps.conf",
        indoc! {"
            architecture=x86_64
            bestmatching=yes
            repository=/some/repo
        "},
    );
    let mut config = Config::default();
    config.load_file(&path).unwrap();
    assert!(config.architecture.as_deref() == Some("x86_64"));
    assert!(config.bestmatching);
    assert!(config.repositories == vec![S!("/some/repo")]);
}

#[test]
fn skips_blank_lines_and_comments() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        "xbps.conf",
        indoc! {"
            # a comment

            architecture=x86_64
        "},
    );
    let mut config = Config::default();
    config.load_file(&path).unwrap();
    assert!(config.architecture.as_deref() == Some("x86_64"));
}

#[test]
fn rejects_line_without_equals() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "xbps.conf", "architecture\n");
    let mut config = Config::default();
    assert_let!(Err(Error::Syntax(..)) = config.load_file(&path));
}

#[test]
fn rejects_unknown_key() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "xbps.conf", "bogus=1\n");
    let mut config = Config::default();
    assert_let!(Err(Error::UnknownKey(..)) = config.load_file(&path));
}

#[test]
fn parses_virtualpkg_pair() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "xbps.conf", "virtualpkg=libjpeg:libjpeg-turbo\n");
    let mut config = Config::default();
    config.load_file(&path).unwrap();
    assert!(config.virtualpkg.get("libjpeg").map(String::as_str) == Some("libjpeg-turbo"));
}

#[test]
fn rejects_malformed_virtualpkg() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "xbps.conf", "virtualpkg=nocolon\n");
    let mut config = Config::default();
    assert_let!(Err(Error::MalformedVirtualpkg(..)) = config.load_file(&path));
}

#[test]
fn include_expands_globs_in_lexical_order() {
    let dir = tempdir().unwrap();
    let includes_dir = dir.path().join("includes.d");
    std::fs::create_dir(&includes_dir).unwrap();
    write(&includes_dir, "10-a.conf", "repository=/repo-a\n");
    write(&includes_dir, "20-b.conf", "repository=/repo-b\n");
    let main = write(dir.path(), "xbps.conf", "include=includes.d/*.conf\n");

    let mut config = Config::default();
    config.load_file(&main).unwrap();
    assert!(config.repositories == vec![S!("/repo-a"), S!("/repo-b")]);
}

#[test]
fn include_does_not_recurse_past_one_level() {
    let dir = tempdir().unwrap();
    let includes_dir = dir.path().join("includes.d");
    std::fs::create_dir(&includes_dir).unwrap();
    write(&includes_dir, "a.conf", "include=ignored.conf\nrepository=/repo-a\n");
    let main = write(dir.path(), "xbps.conf", "include=includes.d/*.conf\n");

    let mut config = Config::default();
    // The nested `include=` line names a nonexistent file but since the
    // second-level file's own `include` is never followed, no error occurs.
    config.load_file(&main).unwrap();
    assert!(config.repositories == vec![S!("/repo-a")]);
}

#[test]
fn match_mode_reflects_bestmatching() {
    let mut config = Config::default();
    assert!(matches!(config.match_mode(), MatchMode::FirstHit));
    config.bestmatching = true;
    assert!(matches!(config.match_mode(), MatchMode::BestMatching));
}
