//! Cross-component tests for the retrieval core.

mod search_properties;
