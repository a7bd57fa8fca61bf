//! avalia — questionnaire composition and versioning engine.
//!
//! Standardized clinical assessments are stored as trees: a Questionnaire
//! owns ordered Sessions, a Session owns ordered Questions, a Question owns
//! its answer Alternatives. Sessions may carry a conditional-visibility rule
//! referencing a question elsewhere in the same questionnaire.
//!
//! This crate owns the relational tree store, the visibility rule model,
//! the version-annotated title scheme and the clone engine that copies a
//! whole tree under a new version label, remapping internal references to
//! their cloned counterparts. HTTP routing, authentication, file storage
//! and report scoring live in the surrounding platform and consume this
//! crate through [`questionnaires`] and [`duplication`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod versioning;
pub mod duplication; // clone engine: deep copy + reference remap
pub mod questionnaires; // public operations + tree views

pub use duplication::duplicate_questionnaire;
pub use error::QuestionnaireError;
pub use questionnaires::{
    create_questionnaire, read_questionnaire_tree, QuestionnaireTree,
};
