//! Sequencing: command/document text to node subtrees

pub mod ast;
pub mod generator;
pub mod parser;
pub mod types;

pub use generator::{AttributeExtension, Diagnostic, ExtensionHandler, ExtensionRegistry, NodeGenerator};
pub use parser::{CommandParser, JsonTreeParser};
pub use types::{DataType, DataTypeName, DataTypeService, StandardTypes};

use crate::Error;
use crate::graph::{NodePath, PropertyValue};
use crate::uow::UnitOfWork;
use ast::LanguageObject;

/// What one sequencing call produced.
///
/// On a fatal error the subtree may be partially written; the caller decides whether
/// to roll the unit of work back.
#[derive(Debug, Default)]
pub struct SequenceOutcome {
    /// First node created under the target parent
    pub root: Option<NodePath>,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<Error>,
}

impl SequenceOutcome {
    fn failed(err: Error) -> Self {
        Self {
            error: Some(err),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Fatal error as `Err`, otherwise the created root and diagnostics
    pub fn into_result(self) -> crate::Result<(Option<NodePath>, Vec<Diagnostic>)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.root, self.diagnostics)),
        }
    }
}

/// Parser, type service and extension handlers bundled for repeated use
pub struct Sequencer {
    parser: Box<dyn CommandParser>,
    types: Box<dyn DataTypeService>,
    extensions: ExtensionRegistry,
    metadata_version: String,
    max_depth: usize,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Box::new(JsonTreeParser))
    }
}

impl Sequencer {
    pub fn new(parser: Box<dyn CommandParser>) -> Self {
        Self {
            parser,
            types: Box::new(StandardTypes),
            extensions: ExtensionRegistry::new(),
            metadata_version: crate::config::DEFAULT_METADATA_VERSION.to_string(),
            max_depth: NodeGenerator::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_types(mut self, types: Box<dyn DataTypeService>) -> Self {
        self.types = types;
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_metadata_version(mut self, version: &str) -> Self {
        self.metadata_version = version.to_string();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Parse without sequencing, e.g. to choose a parent by tree kind
    pub fn parse(&self, text: &str) -> crate::Result<LanguageObject> {
        self.parser.parse(text)
    }

    /// Parse `text` and sequence it under `parent`
    pub fn sequence(&self, uow: &mut UnitOfWork, text: &str, parent: &NodePath) -> SequenceOutcome {
        match self.parse(text) {
            Ok(tree) => self.sequence_tree(uow, &tree, parent),
            Err(err) => SequenceOutcome::failed(err),
        }
    }

    /// Sequence an already parsed tree under `parent`
    pub fn sequence_tree(&self, uow: &mut UnitOfWork, tree: &LanguageObject, parent: &NodePath) -> SequenceOutcome {
        if let Err(err) = uow.ensure_live() {
            return SequenceOutcome::failed(err);
        }
        let mut generator = NodeGenerator::new(parent.clone(), self.types.as_ref(), &self.extensions)
            .metadata_version(&self.metadata_version)
            .max_depth(self.max_depth);
        generator.visit(uow, tree);
        generator.into_outcome()
    }

    /// Sequence the text stored in a string or binary property of `input` under `output`
    pub fn sequence_property(
        &self,
        uow: &mut UnitOfWork,
        input: &NodePath,
        property: &str,
        output: &NodePath,
    ) -> SequenceOutcome {
        let stored = match uow.property(input, property) {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                return SequenceOutcome::failed(Error::Sequencing(format!(
                    "{} has no property '{}'",
                    input, property
                )));
            }
            Err(err) => return SequenceOutcome::failed(err),
        };

        let text = match stored.first() {
            Some(PropertyValue::String(text)) => text.clone(),
            Some(PropertyValue::Binary(bytes)) => match String::from_utf8(bytes.clone()) {
                Ok(text) => text,
                Err(e) => {
                    return SequenceOutcome::failed(Error::Parse(format!(
                        "{}/{} is not UTF-8: {}",
                        input, property, e
                    )));
                }
            },
            _ => {
                return SequenceOutcome::failed(Error::Sequencing(format!(
                    "{}/{} holds no textual content",
                    input, property
                )));
            }
        };
        self.sequence(uow, &text, output)
    }
}
