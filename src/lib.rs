//! Dollar config - dynamic values for nested configuration trees
//!
//! Config documents are plain JSON/YAML trees in which some objects are
//! keyword nodes: `$param`, `$template`, `$guard`, `$switch`, `$function`.
//! They can be resolved eagerly ([`resolve`]), leaving residual nodes for
//! missing params, or bound lazily ([`BoundConfig`]) into a memoized live
//! graph. [`schema`] generates JSON Schema that accepts those forms.

pub mod bind;
pub mod config;
pub mod error;
pub mod function;
pub mod loader;
pub mod node;
pub mod params;
pub mod path;
pub mod request;
pub mod resolve;
pub mod schema;
pub mod template;

pub use bind::{BoundConfig, SlotStatus};
pub use config::Config;
pub use error::{DollarError, FixSuggestion, Result};
pub use function::FunctionRegistry;
pub use loader::load_config;
pub use node::Node;
pub use params::{flatten, Lookup, Params};
pub use request::RequestConfig;
pub use resolve::{build, resolve, resolve_value};
pub use schema::{DynamicValidator, SchemaCache};
