//! URL classification for the crawler
//!
//! Pure functions used by every fetch worker:
//! - Normalization (fragment stripping)
//! - Registrable domain comparison and subdomain extraction
//! - Path and subdomain exclusion patterns

mod domain;
mod exclusion;
mod normalize;

pub use domain::{extract_domain, registrable_domain, same_registrable_domain, subdomain_of};
pub use exclusion::{is_excluded, ExclusionRules};
pub use normalize::{is_http, normalize_url, parse_target_url, strip_fragment};
