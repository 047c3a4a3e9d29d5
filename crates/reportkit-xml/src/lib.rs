//! Span-tracked XML parsing for reportkit.
//!
//! This crate wraps [`quick-xml`] to produce a small owned tree of
//! [`XmlElement`]s. Every element, attribute and text node remembers the byte
//! [`Span`] it came from, so callers that validate the tree (the schema
//! materializer in `reportkit-core`) can point at the offending line and column.
//!
//! # Example
//!
//! ```rust
//! use reportkit_xml::parse;
//!
//! let xml = parse(r#"<reportSchema name="Monthly">
//!   <dataSets>
//!     <dataSet name="enrolled" type="cohort-count"/>
//!   </dataSets>
//! </reportSchema>"#).unwrap();
//!
//! assert_eq!(xml.root.name, "reportSchema");
//! assert_eq!(xml.root.get_attribute("name"), Some("Monthly"));
//!
//! let data_sets = xml.root.get_children("dataSets");
//! assert_eq!(data_sets[0].get_children("dataSet").len(), 1);
//! ```

pub mod error;
pub mod parser;
pub mod span;
pub mod types;

pub use error::{Error, Result};
pub use parser::parse;
pub use span::{LineColumn, Span};
pub use types::{XmlAttribute, XmlChild, XmlChildren, XmlDocument, XmlElement};
