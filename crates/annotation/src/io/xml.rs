use roxmltree::{Document, Node};

use crate::{
    error::{AnnotationError, Result},
    types::Ring,
};

/// One `Annotation` element: a class label and its rings in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAnnotation {
    pub label: String,
    pub rings: Vec<Ring>,
}

/// Parse an annotation export.
///
/// The `Annotations` element may be the document root or any descendant.
/// Each `Annotation` needs a `class` attribute; each `Coordinates` child is
/// one ring made of `Coordinate` elements with `x` and `y` attributes.
pub fn parse_annotations(xml: &str) -> Result<Vec<XmlAnnotation>> {
    let document = Document::parse(xml)?;

    let annotations = document
        .descendants()
        .find(|node| node.has_tag_name("Annotations"))
        .ok_or_else(|| AnnotationError::MalformedXml("missing Annotations element".to_string()))?;

    annotations
        .children()
        .filter(|node| node.has_tag_name("Annotation"))
        .map(parse_annotation)
        .collect()
}

fn parse_annotation(node: Node) -> Result<XmlAnnotation> {
    let label = node
        .attribute("class")
        .ok_or_else(|| malformed(node, "Annotation without a class attribute"))?
        .to_string();

    let rings = node
        .children()
        .filter(|child| child.has_tag_name("Coordinates"))
        .map(|coordinates| {
            coordinates
                .children()
                .filter(|child| child.has_tag_name("Coordinate"))
                .map(|coordinate| Ok([float_attribute(coordinate, "x")?, float_attribute(coordinate, "y")?]))
                .collect::<Result<Ring>>()
        })
        .collect::<Result<Vec<Ring>>>()?;

    Ok(XmlAnnotation { label, rings })
}

fn float_attribute(node: Node, name: &str) -> Result<f64> {
    let raw = node
        .attribute(name)
        .ok_or_else(|| malformed(node, &format!("Coordinate without '{name}'")))?;

    raw.trim()
        .parse::<f64>()
        .map_err(|_| malformed(node, &format!("'{name}' is not a number: {raw:?}")))
}

fn malformed(node: Node, message: &str) -> AnnotationError {
    let position = node.document().text_pos_at(node.range().start);
    AnnotationError::MalformedXml(format!("{message} at {position}"))
}
