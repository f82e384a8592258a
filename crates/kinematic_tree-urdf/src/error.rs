use std::path::PathBuf;

/// Common result type for URDF loading
pub type Result<T> = std::result::Result<T, UrdfError>;

/// Errors raised while reading a URDF document or building a tree from it
#[derive(Debug, thiserror::Error)]
pub enum UrdfError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML or has no `<robot>` element
    #[error("XML parse error: {0}")]
    Xml(String),

    /// A required child element is absent
    #[error("Missing <{element}> in {context}")]
    MissingElement {
        element: &'static str,
        context: String,
    },

    /// A required attribute is absent
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        attribute: &'static str,
        element: String,
    },

    /// An attribute that should hold numbers does not
    #[error("Invalid number in '{attribute}' on <{element}>: {value}")]
    InvalidNumber {
        attribute: &'static str,
        element: String,
        value: String,
    },

    /// Links whose parent never appeared, even after repeated passes
    #[error("Unresolved links: {}", links.join(", "))]
    Unresolved { links: Vec<String> },

    /// The kinematic tree rejected a frame
    #[error(transparent)]
    Tree(#[from] kinematic_tree::Error),
}

impl UrdfError {
    pub(crate) fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    pub(crate) fn missing_attribute(attribute: &'static str, element: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute,
            element: element.into(),
        }
    }
}

impl From<quick_xml::Error> for UrdfError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Xml(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = UrdfError::missing_attribute("link", "parent");
        assert_eq!(e.to_string(), "Missing attribute 'link' on <parent>");

        let e = UrdfError::Unresolved {
            links: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(e.to_string(), "Unresolved links: a, b");

        let e = UrdfError::missing_element("child", "joint 'j1'");
        assert!(e.to_string().contains("<child>"));
        assert!(e.to_string().contains("j1"));
    }

    #[test]
    fn test_tree_error_is_transparent() {
        let e: UrdfError = kinematic_tree::Error::DuplicateFrame {
            name: "link1".to_string(),
        }
        .into();
        assert_eq!(e.to_string(), "Duplicate frame name: link1");
    }
}
