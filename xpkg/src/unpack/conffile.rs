//! The conf-file three-way merge decision table: given
//! the previous installation's stored hash (`orig`), what's actually on
//! disk right now (`cur`), and the incoming archive's hash (`new`), decide
//! whether to install, keep, or install-as-`.new-<version>`.

/// What to do with an incoming conf-file, independent of how the decision
/// gets carried out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `orig == cur == new`, or `orig == cur != new` with `keep_config` set:
    /// leave the file untouched.
    Skip,
    /// `orig == cur != new` (no `keep_config`), or no previous install and
    /// nothing on disk yet: the new content replaces the path outright.
    InstallNew,
    /// `orig != cur` and `cur == new`, or `orig != cur` and `new == orig`:
    /// the user's edits stand, upstream's new content is dropped silently.
    KeepCurrent,
    /// `orig`, `cur` and `new` are three distinct values (or there's no
    /// previous install but something's already on disk): install beside
    /// the existing file as `<path>.new-<version>` rather than overwrite it.
    InstallAsNew,
}

/// Applies the three-way merge decision table. `orig` is `None` when the
/// path wasn't tracked by a previous installation of this package (the
/// table's "not previously installed" rows).
pub fn decide(orig: Option<&str>, cur: Option<&str>, new: &str, keep_config: bool) -> Decision {
    match (orig, cur) {
        (Some(orig), Some(cur)) => {
            if orig == cur {
                if cur == new {
                    Decision::Skip
                } else if keep_config {
                    Decision::InstallAsNew
                } else {
                    Decision::InstallNew
                }
            } else if cur == new || orig == new {
                Decision::KeepCurrent
            } else {
                Decision::InstallAsNew
            }
        }
        (None, Some(_)) => Decision::InstallAsNew,
        (_, None) => Decision::InstallNew,
    }
}

#[cfg(test)]
#[path = "conffile.test.rs"]
mod test;
