//! Proptest strategies for storyline property-based testing.

pub mod strategies;

pub use strategies::{
    strategy_attachment, strategy_doc_entry, strategy_doc_leaf, strategy_error_info, strategy_json_value,
    strategy_keyword, strategy_source_location, strategy_status, strategy_step,
    strategy_story_record, strategy_table, strategy_text,
};
