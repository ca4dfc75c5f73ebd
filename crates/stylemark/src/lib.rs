//! # Stylemark - computed styles to design tokens
//!
//! Stylemark turns a sampled inventory of computed styles into a ranked set of
//! design tokens. The pipeline has five stages, each a pure transformation over
//! the output of the previous one:
//!
//! 1. **Sampling** ([`sampler`]): visit routes x viewports through a
//!    [`StyleProbe`] and capture one [`StyleRecord`] per matched element.
//! 2. **Deduplication** ([`dedup`]): collapse records into a per-property
//!    frequency table with provenance samples.
//! 3. **Aggregation** ([`aggregate`]): fold the table into color, spacing,
//!    radius, border-width, shadow and typography frequency lists.
//! 4. **Token building** ([`tokens`]): assign stable ordinal names.
//! 5. **Emission** ([`emit`]): serialize to a `:root` stylesheet and a JSON
//!    manifest, mirrored to several static directories.
//!
//! Alongside the token pipeline, [`states`] captures how buttons, links and
//! inputs change when hovered, focused, pressed or disabled.
//!
//! The browser itself is an external collaborator: everything after the
//! [`StyleProbe`] boundary runs without one, which is how the tests drive it.
//!
//! ## Quick example
//!
//! ```rust
//! use stylemark::{aggregate_all, build_tokens, deduplicate, render_css};
//!
//! let records = Vec::new();
//! let table = deduplicate(&records);
//! let tokens = build_tokens(&aggregate_all(&table, &records));
//! let css = render_css(&tokens).unwrap();
//! assert_eq!(css, ":root {\n}\n");
//! ```

pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod emit;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sampler;
pub mod states;
pub mod tokens;

pub use aggregate::{
    aggregate_all, aggregate_colors, aggregate_px, aggregate_shadows, aggregate_typography,
    normalize_px, typography_from_table, AggregatedEntry, Aggregates, TypographyEntry,
};
pub use config::{
    load_reference_settings, load_role_selectors, load_sampler_config, EnvOverrides,
    ReferenceConfig, RoleSelectors, RoleSource, SamplerConfig, Settings, Viewport,
};
pub use dedup::{deduplicate, DedupTable, TypographyTuple, ValueStats, ValueTable};
pub use emit::{render_css, render_json, write_css_mirrors, write_json};
pub use error::{Error, ProbeError};
pub use pipeline::{load_inventory, tokenize, InventoryInput, TokenSummary, TokenizeOptions};
pub use record::{Provenance, Rect, StyleRecord, TypographyValues, STYLE_FIELDS};
pub use sampler::{
    collect_inventory, ElementSample, InventoryReport, ProbeRequest, RouteError, StyleProbe,
    ROLE_SAMPLE_LIMIT, SETTLE_TIMEOUT,
};
pub use states::{
    collect_states, default_state_categories, reference_state_categories, style_delta,
    StateCapture, StateCategory, StateDeltas, StateRecord, StateRequest, StatesReport,
    STATE_FIELDS,
};
pub use tokens::{build_tokens, Token, TokenKind, TokenSet};
