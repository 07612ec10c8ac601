//! Static validation of pass dependencies.
//!
//! Runs before any target is created or any GPU command issued, so a
//! misordered procedure never renders a partial frame.

use std::collections::HashSet;

use crate::error::GraphicsError;
use crate::types::Attachment;

use super::descriptor::{PassInput, PassOutput, TargetDecl};

/// The dependency-relevant view of one pass.
#[derive(Debug, Clone, Copy)]
pub struct PassIo<'a> {
    pub name: &'a str,
    pub output: &'a PassOutput,
    pub reads: &'a [PassInput],
}

/// Check target declarations and producer-before-consumer ordering.
///
/// # Errors
///
/// - [`GraphicsError::UndeclaredTarget`] when a pass reads or writes a
///   target that is not declared
/// - [`GraphicsError::InvalidOrdering`] when a pass reads a target that no
///   strictly earlier pass writes
/// - [`GraphicsError::InvalidParameter`] for duplicate target or pass names,
///   a depth read from a target without depth, or a pass reading its own
///   output
pub fn validate_passes(targets: &[TargetDecl], passes: &[PassIo<'_>]) -> Result<(), GraphicsError> {
    let mut declared = HashSet::new();
    for target in targets {
        if !declared.insert(target.name.as_str()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "target '{}' is declared twice",
                target.name
            )));
        }
    }

    let mut pass_names = HashSet::new();
    let mut produced: HashSet<&str> = HashSet::new();
    for pass in passes {
        if !pass_names.insert(pass.name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass '{}' is declared twice",
                pass.name
            )));
        }

        let output = match pass.output {
            PassOutput::BackBuffer => None,
            PassOutput::Target(name) => {
                if !declared.contains(name.as_str()) {
                    return Err(GraphicsError::UndeclaredTarget {
                        pass: pass.name.to_string(),
                        target: name.clone(),
                    });
                }
                Some(name.as_str())
            }
        };

        for input in pass.reads {
            let Some(decl) = targets.iter().find(|t| t.name == input.target) else {
                return Err(GraphicsError::UndeclaredTarget {
                    pass: pass.name.to_string(),
                    target: input.target.clone(),
                });
            };
            if output == Some(input.target.as_str()) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "pass '{}' reads its own output '{}'",
                    pass.name, input.target
                )));
            }
            if !produced.contains(input.target.as_str()) {
                return Err(GraphicsError::InvalidOrdering {
                    pass: pass.name.to_string(),
                    target: input.target.clone(),
                });
            }
            if input.attachment == Attachment::Depth && decl.depth_format.is_none() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "pass '{}' reads the depth of '{}', which has no depth buffer",
                    pass.name, input.target
                )));
            }
        }

        if let Some(name) = output {
            produced.insert(name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::TargetSize;
    use crate::types::TextureFormat;

    fn target(name: &str) -> TargetDecl {
        TargetDecl::new(name, TargetSize::default(), TextureFormat::Rgba8Unorm)
    }

    struct Pass {
        name: &'static str,
        output: PassOutput,
        reads: Vec<PassInput>,
    }

    fn pass(name: &'static str, output: Option<&str>, reads: &[&str]) -> Pass {
        Pass {
            name,
            output: output.map_or(PassOutput::BackBuffer, |t| PassOutput::Target(t.into())),
            reads: reads.iter().map(|r| PassInput::color(*r)).collect(),
        }
    }

    fn validate(targets: &[TargetDecl], passes: &[Pass]) -> Result<(), GraphicsError> {
        let io: Vec<PassIo<'_>> = passes
            .iter()
            .map(|p| PassIo {
                name: p.name,
                output: &p.output,
                reads: &p.reads,
            })
            .collect();
        validate_passes(targets, &io)
    }

    #[test]
    fn test_producer_before_consumer() {
        let targets = [target("shadow"), target("scene")];
        let passes = [
            pass("shadow", Some("shadow"), &[]),
            pass("main", Some("scene"), &["shadow"]),
            pass("bloom", None, &["scene"]),
        ];
        assert!(validate(&targets, &passes).is_ok());
    }

    #[test]
    fn test_consumer_first_is_invalid_ordering() {
        let targets = [target("scene")];
        let passes = [
            pass("bloom", None, &["scene"]),
            pass("main", Some("scene"), &[]),
        ];
        assert_eq!(
            validate(&targets, &passes),
            Err(GraphicsError::InvalidOrdering {
                pass: "bloom".into(),
                target: "scene".into(),
            })
        );
    }

    #[test]
    fn test_undeclared_target() {
        let passes = [pass("bloom", None, &["scene"])];
        assert!(matches!(
            validate(&[], &passes),
            Err(GraphicsError::UndeclaredTarget { .. })
        ));
        let passes = [pass("main", Some("scene"), &[])];
        assert!(matches!(
            validate(&[], &passes),
            Err(GraphicsError::UndeclaredTarget { .. })
        ));
    }

    #[test]
    fn test_self_read_and_depth_read_rejected() {
        let targets = [target("a")];
        let passes = [
            pass("first", Some("a"), &[]),
            pass("second", Some("a"), &["a"]),
        ];
        assert!(matches!(
            validate(&targets, &passes),
            Err(GraphicsError::InvalidParameter(_))
        ));

        let mut passes = vec![pass("first", Some("a"), &[]), pass("second", None, &[])];
        passes[1].reads.push(PassInput::depth("a"));
        assert!(matches!(
            validate(&targets, &passes),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_duplicate_names() {
        assert!(validate(&[target("a"), target("a")], &[]).is_err());
        let passes = [pass("p", None, &[]), pass("p", None, &[])];
        assert!(validate(&[], &passes).is_err());
    }
}
