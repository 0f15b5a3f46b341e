use super::*;
use crate::internal::test_utils::assert;

#[test]
fn unchanged_on_both_sides_is_skipped() {
    assert!(decide(Some("a"), Some("a"), "a", false) == Decision::Skip);
}

#[test]
fn upstream_change_with_untouched_local_installs_new() {
    assert!(decide(Some("a"), Some("a"), "b", false) == Decision::InstallNew);
}

#[test]
fn upstream_change_with_untouched_local_keeps_under_keep_config() {
    assert!(decide(Some("a"), Some("a"), "b", true) == Decision::InstallAsNew);
}

#[test]
fn local_edit_matching_new_content_keeps_current() {
    assert!(decide(Some("a"), Some("b"), "b", false) == Decision::KeepCurrent);
}

#[test]
fn local_edit_reverted_to_orig_by_upstream_keeps_current() {
    assert!(decide(Some("a"), Some("b"), "a", false) == Decision::KeepCurrent);
}

#[test]
fn three_way_divergence_installs_as_new() {
    assert!(decide(Some("a"), Some("b"), "c", false) == Decision::InstallAsNew);
}

#[test]
fn previously_untracked_but_present_on_disk_installs_as_new() {
    assert!(decide(None, Some("whatever"), "new", false) == Decision::InstallAsNew);
}

#[test]
fn fresh_install_with_nothing_on_disk_installs_new() {
    assert!(decide(None, None, "new", false) == Decision::InstallNew);
}

#[test]
fn tracked_but_user_deleted_reinstalls() {
    assert!(decide(Some("a"), None, "b", false) == Decision::InstallNew);
}
