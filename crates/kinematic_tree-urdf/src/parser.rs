//! URDF XML parsing into [`UrdfModel`]
//!
//! Only what the kinematic tree needs is collected: link names and inertial
//! blocks, and for each joint its type, parent, child, origin and axis.
//! Visual, collision, limit and other elements are skipped.

use std::io::BufRead;
use std::path::Path;

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Result, UrdfError};
use crate::model::{Origin, UrdfInertial, UrdfJoint, UrdfJointType, UrdfLink, UrdfModel};

/// Parse a URDF document held in memory
///
/// # Example
/// ```rust
/// let model = kinematic_tree_urdf::parse_str(
///     r#"<robot name="r"><link name="base"/></robot>"#,
/// )?;
/// assert_eq!(model.links.len(), 1);
/// # Ok::<(), kinematic_tree_urdf::UrdfError>(())
/// ```
pub fn parse_str(xml: &str) -> Result<UrdfModel> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"robot" => {
                let model = parse_robot(&mut reader, &e)?;
                debug!(
                    robot = %model.name,
                    links = model.links.len(),
                    joints = model.joints.len(),
                    "parsed URDF"
                );
                return Ok(model);
            }
            Event::Empty(e) if e.name().as_ref() == b"robot" => {
                return Ok(UrdfModel {
                    name: attribute(&e, "name")?.unwrap_or_default(),
                    ..UrdfModel::default()
                });
            }
            Event::Eof => return Err(UrdfError::Xml("no <robot> element".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Read and parse a URDF file
pub fn parse_file(path: impl AsRef<Path>) -> Result<UrdfModel> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|source| UrdfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&xml)
}

fn parse_robot<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfModel> {
    let mut model = UrdfModel {
        name: attribute(start, "name")?.unwrap_or_default(),
        ..UrdfModel::default()
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"link" => model.links.push(parse_link(reader, &e)?),
                b"joint" => model.joints.push(parse_joint(reader, &e)?),
                _ => skip_element(reader)?,
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"link" => model.links.push(UrdfLink {
                    name: required(&e, "name")?,
                    inertial: None,
                }),
                b"joint" => {
                    let name = required(&e, "name")?;
                    return Err(UrdfError::missing_element(
                        "parent",
                        format!("joint '{name}'"),
                    ));
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"robot" => break,
            Event::Eof => return Err(unexpected_eof("robot")),
            _ => {}
        }
        buf.clear();
    }
    Ok(model)
}

fn parse_link<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfLink> {
    let mut link = UrdfLink {
        name: required(start, "name")?,
        inertial: None,
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"inertial" => {
                link.inertial = Some(parse_inertial(reader)?);
            }
            Event::Start(_) => skip_element(reader)?,
            Event::End(e) if e.name().as_ref() == b"link" => break,
            Event::Eof => return Err(unexpected_eof("link")),
            _ => {}
        }
        buf.clear();
    }
    Ok(link)
}

fn parse_inertial<R: BufRead>(reader: &mut Reader<R>) -> Result<UrdfInertial> {
    let mut inertial = UrdfInertial::default();

    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        let opened = matches!(event, Event::Start(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"origin" => inertial.origin = parse_origin(&e)?,
                b"mass" => inertial.mass = number(&e, "value")?,
                b"inertia" => {
                    inertial.diagonal = Vector3::new(
                        optional_number(&e, "ixx")?.unwrap_or(0.0),
                        optional_number(&e, "iyy")?.unwrap_or(0.0),
                        optional_number(&e, "izz")?.unwrap_or(0.0),
                    );
                }
                _ if opened => skip_element(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"inertial" => break,
            Event::Eof => return Err(unexpected_eof("inertial")),
            _ => {}
        }
        buf.clear();
    }
    Ok(inertial)
}

fn parse_joint<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfJoint> {
    let name = required(start, "name")?;
    let joint_type = UrdfJointType::parse(&required(start, "type")?);
    let mut parent = None;
    let mut child = None;
    let mut origin = Origin::default();
    let mut axis = Vector3::x();

    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        let opened = matches!(event, Event::Start(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"parent" => parent = Some(required(&e, "link")?),
                b"child" => child = Some(required(&e, "link")?),
                b"origin" => origin = parse_origin(&e)?,
                b"axis" => {
                    if let Some(xyz) = triplet(&e, "xyz")? {
                        axis = xyz;
                    }
                }
                _ if opened => skip_element(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"joint" => break,
            Event::Eof => return Err(unexpected_eof("joint")),
            _ => {}
        }
        buf.clear();
    }

    let context = || format!("joint '{name}'");
    let parent = parent.ok_or_else(|| UrdfError::missing_element("parent", context()))?;
    let child = child.ok_or_else(|| UrdfError::missing_element("child", context()))?;
    Ok(UrdfJoint {
        name,
        joint_type,
        parent,
        child,
        origin,
        axis,
    })
}

fn parse_origin(e: &BytesStart) -> Result<Origin> {
    Ok(Origin {
        xyz: triplet(e, "xyz")?.unwrap_or_else(Vector3::zeros),
        rpy: triplet(e, "rpy")?.unwrap_or_else(Vector3::zeros),
    })
}

/// Consume events up to and including the end of the element just opened
fn skip_element<R: BufRead>(reader: &mut Reader<R>) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(UrdfError::Xml("unexpected end of document".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn unexpected_eof(element: &str) -> UrdfError {
    UrdfError::Xml(format!("unexpected end of document inside <{element}>"))
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Unescaped value of attribute `name`, `None` when absent
fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required(e: &BytesStart, name: &'static str) -> Result<String> {
    attribute(e, name)?.ok_or_else(|| UrdfError::missing_attribute(name, element_name(e)))
}

fn invalid_number(e: &BytesStart, name: &'static str, value: &str) -> UrdfError {
    UrdfError::InvalidNumber {
        attribute: name,
        element: element_name(e),
        value: value.to_string(),
    }
}

fn number(e: &BytesStart, name: &'static str) -> Result<f64> {
    optional_number(e, name)?.ok_or_else(|| UrdfError::missing_attribute(name, element_name(e)))
}

fn optional_number(e: &BytesStart, name: &'static str) -> Result<Option<f64>> {
    attribute(e, name)?
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid_number(e, name, &value))
        })
        .transpose()
}

/// Three whitespace-separated numbers, `None` when the attribute is absent
fn triplet(e: &BytesStart, name: &'static str) -> Result<Option<Vector3<f64>>> {
    let Some(value) = attribute(e, name)? else {
        return Ok(None);
    };
    let parts = value
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid_number(e, name, &value))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Some(Vector3::new(*x, *y, *z))),
        _ => Err(invalid_number(e, name, &value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const TWO_LINK: &str = r#"<?xml version="1.0"?>
<robot name="two_link">
  <material name="grey"><color rgba="0.5 0.5 0.5 1"/></material>
  <link name="base">
    <visual>
      <geometry><box size="1 1 1"/></geometry>
    </visual>
  </link>
  <link name="arm">
    <inertial>
      <origin xyz="0.5 0 0" rpy="0 0 0"/>
      <mass value="2.0"/>
      <inertia ixx="0.1" ixy="0" ixz="0" iyy="0.2" iyz="0" izz="0.3"/>
    </inertial>
  </link>
  <joint name="shoulder" type="revolute">
    <parent link="base"/>
    <child link="arm"/>
    <origin xyz="0 0 1" rpy="0 0 1.57"/>
    <axis xyz="0 1 0"/>
    <limit lower="-1" upper="1" effort="10" velocity="1"/>
  </joint>
</robot>
"#;

    #[test]
    fn test_parse_two_link() {
        let model = parse_str(TWO_LINK).unwrap();
        assert_eq!(model.name, "two_link");
        assert_eq!(model.links.len(), 2);
        assert!(model.link("base").unwrap().inertial.is_none());

        let inertial = model.link("arm").unwrap().inertial.unwrap();
        assert_eq!(inertial.mass, 2.0);
        assert_eq!(inertial.diagonal, Vector3::new(0.1, 0.2, 0.3));
        assert_eq!(inertial.origin.xyz, Vector3::new(0.5, 0.0, 0.0));

        let joint = model.joint("shoulder").unwrap();
        assert_eq!(joint.joint_type, UrdfJointType::Revolute);
        assert_eq!(joint.parent, "base");
        assert_eq!(joint.child, "arm");
        assert_eq!(joint.origin.xyz, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(joint.origin.rpy, Vector3::new(0.0, 0.0, 1.57));
        assert_eq!(joint.axis, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_defaults_for_missing_origin_and_axis() {
        let model = parse_str(
            r#"<robot name="r">
                 <joint name="j" type="continuous">
                   <parent link="a"/><child link="b"/>
                 </joint>
               </robot>"#,
        )
        .unwrap();
        let joint = &model.joints[0];
        assert_eq!(joint.origin, Origin::default());
        assert_eq!(joint.axis, Vector3::x());
    }

    #[test]
    fn test_missing_child_is_an_error() {
        let err = parse_str(
            r#"<robot name="r"><joint name="j" type="fixed"><parent link="a"/></joint></robot>"#,
        )
        .unwrap_err();
        assert!(matches!(err, UrdfError::MissingElement { element: "child", .. }));
    }

    #[test]
    fn test_missing_attribute_is_an_error() {
        let err = parse_str(r#"<robot name="r"><joint name="j"><parent link="a"/></joint></robot>"#)
            .unwrap_err();
        assert!(matches!(
            err,
            UrdfError::MissingAttribute {
                attribute: "type",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = parse_str(
            r#"<robot name="r">
                 <joint name="j" type="fixed">
                   <parent link="a"/><child link="b"/>
                   <origin xyz="0 one 0"/>
                 </joint>
               </robot>"#,
        )
        .unwrap_err();
        assert!(matches!(err, UrdfError::InvalidNumber { attribute: "xyz", .. }));

        let err = parse_str(
            r#"<robot name="r"><joint name="j" type="fixed">
                 <parent link="a"/><child link="b"/><axis xyz="0 0"/>
               </joint></robot>"#,
        )
        .unwrap_err();
        assert!(matches!(err, UrdfError::InvalidNumber { attribute: "xyz", .. }));
    }

    #[test]
    fn test_no_robot_element() {
        assert!(matches!(parse_str("<world/>"), Err(UrdfError::Xml(_))));
        assert!(matches!(
            parse_str(r#"<robot name="r"><link name="a">"#),
            Err(UrdfError::Xml(_))
        ));
    }

    #[test]
    fn test_attribute_entities_are_unescaped() {
        let model = parse_str(
            r#"<robot name="r&amp;d">
                 <link name="a&amp;b"/>
                 <joint name="j" type="fixed">
                   <parent link="a&amp;b"/><child link="&lt;tool&gt;"/>
                 </joint>
               </robot>"#,
        )
        .unwrap();
        assert_eq!(model.name, "r&d");
        assert_eq!(model.links[0].name, "a&b");
        assert_eq!(model.joints[0].parent, "a&b");
        assert_eq!(model.joints[0].child, "<tool>");
    }

    #[test]
    fn test_bad_escape_is_an_xml_error() {
        let err = parse_str(r#"<robot name="r"><link name="a&bogus;"/></robot>"#).unwrap_err();
        assert!(matches!(err, UrdfError::Xml(_)));
    }

    #[test]
    fn test_nested_foreign_elements_are_skipped() {
        let model = parse_str(
            r#"<robot name="r">
                 <link name="arm">
                   <inertial>
                     <origin xyz="1 0 0"/>
                     <extra><origin xyz="9 9 9"/></extra>
                     <mass value="1"/>
                   </inertial>
                 </link>
                 <joint name="j" type="revolute">
                   <parent link="base"/><child link="arm"/>
                   <origin xyz="0 0 1"/>
                   <calibration><origin xyz="9 9 9"/><axis xyz="0 1 0"/></calibration>
                 </joint>
               </robot>"#,
        )
        .unwrap();
        let inertial = model.link("arm").unwrap().inertial.unwrap();
        assert_eq!(inertial.origin.xyz, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(inertial.mass, 1.0);

        let joint = model.joint("j").unwrap();
        assert_eq!(joint.origin.xyz, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(joint.axis, Vector3::x());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_link.urdf");
        std::fs::write(&path, TWO_LINK).unwrap();
        assert_eq!(parse_file(&path).unwrap(), parse_str(TWO_LINK).unwrap());

        let err = parse_file(dir.path().join("missing.urdf")).unwrap_err();
        assert!(matches!(err, UrdfError::Io { .. }));
    }
}
