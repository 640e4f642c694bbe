//! DNS query admission module.
//!
//! Decides whether a query name falls under the configured set of domain
//! suffixes. Queries outside the allowlist are dropped without a response.

mod allowlist;

use hickory_proto::rr::Name;

pub use allowlist::Allowlist;

/// Check a single query name against a suffix set.
///
/// An empty set admits everything. Otherwise the name must sit at or below
/// one of the suffixes, compared label by label and case-insensitively.
/// Unparseable names and suffixes admit nothing.
pub fn admit<S: AsRef<str>>(name: &str, suffixes: &[S]) -> bool {
    let Ok(allowlist) = Allowlist::new(suffixes.iter().map(|s| s.as_ref())) else {
        return false;
    };
    if allowlist.is_empty() {
        return true;
    }
    Name::from_ascii(name).is_ok_and(|name| allowlist.admits(&name))
}
