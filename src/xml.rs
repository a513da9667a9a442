//! Small helpers over `roxmltree` for the strict element/attribute access every decoder needs.

use glam::{Quat, Vec2, Vec3};
use roxmltree::{Document, Node};
use std::path::Path;
use std::str::FromStr;

use crate::error::{DecodeError, DecodeResult};

pub fn parse_document<'i>(text: &'i str, path: &Path) -> DecodeResult<Document<'i>> {
    Document::parse(text).map_err(|source| DecodeError::Xml { path: path.to_path_buf(), source })
}

/// Returns the root element after checking its tag.
pub fn expect_root<'a, 'i>(doc: &'a Document<'i>, tag: &'static str) -> DecodeResult<Node<'a, 'i>> {
    let root = doc.root_element();
    expect_tag(root, tag)?;
    Ok(root)
}

pub fn expect_tag(node: Node<'_, '_>, tag: &'static str) -> DecodeResult<()> {
    let found = node.tag_name().name();
    if found != tag {
        return Err(DecodeError::UnexpectedElement { expected: tag, found: found.to_string() });
    }
    Ok(())
}

pub fn optional_child<'a, 'i>(node: Node<'a, 'i>, tag: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|child| child.is_element() && child.tag_name().name() == tag)
}

/// First child element with the given tag.
pub fn child<'a, 'i>(node: Node<'a, 'i>, tag: &'static str) -> DecodeResult<Node<'a, 'i>> {
    optional_child(node, tag)
        .ok_or_else(|| DecodeError::MissingElement { parent: node.tag_name().name().to_string(), element: tag })
}

/// All child elements with the given tag, in document order.
pub fn children<'a, 'i: 'a>(node: Node<'a, 'i>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

pub fn attr<'a>(node: Node<'a, '_>, name: &'static str) -> DecodeResult<&'a str> {
    node.attribute(name)
        .ok_or_else(|| DecodeError::MissingAttribute { element: node.tag_name().name().to_string(), attribute: name })
}

fn parse_number<T: FromStr>(node: Node<'_, '_>, field: &'static str, raw: &str) -> DecodeResult<T> {
    raw.trim().parse::<T>().map_err(|_| DecodeError::InvalidNumber {
        element: node.tag_name().name().to_string(),
        field,
        value: raw.to_string(),
    })
}

pub fn attr_f32(node: Node<'_, '_>, name: &'static str) -> DecodeResult<f32> {
    parse_number(node, name, attr(node, name)?)
}

pub fn attr_i32(node: Node<'_, '_>, name: &'static str) -> DecodeResult<i32> {
    parse_number(node, name, attr(node, name)?)
}

pub fn attr_u32(node: Node<'_, '_>, name: &'static str) -> DecodeResult<u32> {
    parse_number(node, name, attr(node, name)?)
}

/// Accepts `true`/`false` in any letter case and nothing else.
pub fn attr_bool(node: Node<'_, '_>, name: &'static str) -> DecodeResult<bool> {
    let raw = attr(node, name)?;
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(DecodeError::InvalidBool { element: node.tag_name().name().to_string(), field: name, value: raw.to_string() })
    }
}

/// Parses the element's text content.
pub fn text_number<T: FromStr>(node: Node<'_, '_>) -> DecodeResult<T> {
    parse_number(node, "text", node.text().unwrap_or(""))
}

pub fn vec3_attrs(node: Node<'_, '_>) -> DecodeResult<Vec3> {
    Ok(Vec3::new(attr_f32(node, "x")?, attr_f32(node, "y")?, attr_f32(node, "z")?))
}

/// Reads `<tag><Vector3 x y z/></tag>` below `node`.
pub fn read_vector3(node: Node<'_, '_>, tag: &'static str) -> DecodeResult<Vec3> {
    vec3_attrs(child(child(node, tag)?, "Vector3")?)
}

/// Reads `<tag><Vector2 x y/></tag>` below `node`.
pub fn read_vector2(node: Node<'_, '_>, tag: &'static str) -> DecodeResult<Vec2> {
    let vec = child(child(node, tag)?, "Vector2")?;
    Ok(Vec2::new(attr_f32(vec, "x")?, attr_f32(vec, "y")?))
}

/// Reads `<tag><Quaternion x y z w/></tag>` below `node`.
pub fn read_quaternion(node: Node<'_, '_>, tag: &'static str) -> DecodeResult<Quat> {
    let quat = child(child(node, tag)?, "Quaternion")?;
    Ok(Quat::from_xyzw(attr_f32(quat, "x")?, attr_f32(quat, "y")?, attr_f32(quat, "z")?, attr_f32(quat, "w")?))
}
