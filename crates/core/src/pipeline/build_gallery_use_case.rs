use std::path::PathBuf;

use crate::detection::domain::perception_engine::{DetectOptions, LoadedEngine};
use crate::recognition::domain::gallery::{Gallery, LabeledDescriptor, ReferenceIdentity};
use crate::recognition::domain::reference_image_loader::ReferenceImageLoader;

/// A reference image contained no detectable face.
#[derive(Debug, thiserror::Error)]
#[error("No face found in reference image for '{identity}' ({})", image.display())]
pub struct NoFaceFoundError {
    pub identity: String,
    pub image: PathBuf,
}

/// Why one reference identity could not be described.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Reference image for '{identity}' unavailable: {reason}")]
    ImageUnavailable { identity: String, reason: String },
    #[error(transparent)]
    NoFaceFound(#[from] NoFaceFoundError),
    #[error("Detection failed on reference image for '{identity}': {reason}")]
    Detection { identity: String, reason: String },
    #[error("No descriptor produced for '{identity}'")]
    MissingDescriptor { identity: String },
}

/// Turns configured reference identities into a labeled descriptor gallery.
///
/// Each reference image yields at most one descriptor (single-face
/// detection). Entries sharing a name are merged into one identity.
/// Failures skip the entry; the gallery is never aborted.
pub struct ReferenceGalleryBuilder {
    loader: Box<dyn ReferenceImageLoader>,
}

impl ReferenceGalleryBuilder {
    pub fn new(loader: Box<dyn ReferenceImageLoader>) -> Self {
        Self { loader }
    }

    /// Computes the reference descriptor for a single identity.
    pub fn describe(
        &self,
        engine: &mut LoadedEngine,
        identity: &ReferenceIdentity,
    ) -> Result<LabeledDescriptor, ReferenceError> {
        let frame = self
            .loader
            .load(&identity.image)
            .map_err(|e| ReferenceError::ImageUnavailable {
                identity: identity.name.clone(),
                reason: e.to_string(),
            })?;

        let faces = engine
            .detect(&frame, &DetectOptions::reference())
            .map_err(|e| ReferenceError::Detection {
                identity: identity.name.clone(),
                reason: e.to_string(),
            })?;

        let face = faces.into_iter().next().ok_or_else(|| NoFaceFoundError {
            identity: identity.name.clone(),
            image: identity.image.clone(),
        })?;

        let descriptor = face
            .descriptor
            .ok_or_else(|| ReferenceError::MissingDescriptor {
                identity: identity.name.clone(),
            })?;

        Ok(LabeledDescriptor::new(identity.name.clone(), vec![descriptor]))
    }

    /// Builds the full gallery from scratch.
    ///
    /// With `previous`, an identity whose reference fails this time keeps
    /// the entry it had before.
    pub fn build(
        &self,
        engine: &mut LoadedEngine,
        identities: &[ReferenceIdentity],
        previous: Option<&Gallery>,
    ) -> Gallery {
        let mut entries: Vec<LabeledDescriptor> = Vec::new();
        let mut failed: Vec<&str> = Vec::new();

        for identity in identities {
            match self.describe(engine, identity) {
                Ok(described) => {
                    match entries
                        .iter_mut()
                        .find(|e| e.identity_name == described.identity_name)
                    {
                        Some(entry) => entry.descriptors.extend(described.descriptors),
                        None => entries.push(described),
                    }
                }
                Err(e) => {
                    log::warn!("Skipping reference identity: {e}");
                    failed.push(identity.name.as_str());
                }
            }
        }

        if let Some(previous) = previous {
            for name in failed {
                if entries.iter().any(|e| e.identity_name == name) {
                    continue;
                }
                if let Some(entry) = previous.get(name) {
                    log::info!("Keeping previous reference descriptors for '{name}'");
                    entries.push(entry.clone());
                }
            }
        }

        let gallery = Gallery::new(entries);
        log::info!(
            "Reference gallery built: {} of {} identities",
            gallery.len(),
            identities.len()
        );
        gallery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_observation::FaceObservation;
    use crate::detection::domain::perception_engine::{CapabilityLoadError, FacePerceptionEngine};
    use crate::recognition::domain::descriptor::Descriptor;
    use crate::shared::face_box::BoundingBox;
    use crate::shared::frame::Frame;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Loads a 1-pixel-high frame whose width identifies the image.
    struct StubLoader {
        widths: HashMap<PathBuf, u32>,
    }

    impl ReferenceImageLoader for StubLoader {
        fn load(&self, source: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            let width = *self.widths.get(source).ok_or("file not found")?;
            Ok(Frame::new(vec![0; width as usize * 3], width, 1, 3, 0))
        }
    }

    /// Returns faces keyed by frame width; width 0 means "no face".
    struct StubEngine {
        options_seen: Arc<Mutex<Vec<DetectOptions>>>,
    }

    impl FacePerceptionEngine for StubEngine {
        fn load_capabilities(&mut self) -> Result<(), CapabilityLoadError> {
            Ok(())
        }

        fn detect(
            &mut self,
            frame: &Frame,
            options: &DetectOptions,
        ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
            self.options_seen.lock().unwrap().push(*options);
            match frame.width() {
                1 => Ok(vec![]),
                2 => Err("inference failed".into()),
                width => {
                    let mut face = FaceObservation::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.9);
                    face.descriptor = Some(Descriptor::new(vec![width as f32, 0.0]));
                    let mut weaker = face.clone();
                    weaker.score = 0.5;
                    weaker.descriptor = Some(Descriptor::new(vec![-1.0, -1.0]));
                    Ok(vec![weaker, face])
                }
            }
        }
    }

    fn setup(widths: &[(&str, u32)]) -> (ReferenceGalleryBuilder, LoadedEngine, Arc<Mutex<Vec<DetectOptions>>>) {
        let loader = StubLoader {
            widths: widths
                .iter()
                .map(|(path, width)| (PathBuf::from(path), *width))
                .collect(),
        };
        let options_seen = Arc::new(Mutex::new(Vec::new()));
        let engine = LoadedEngine::load(Box::new(StubEngine {
            options_seen: options_seen.clone(),
        }))
        .unwrap();
        (ReferenceGalleryBuilder::new(Box::new(loader)), engine, options_seen)
    }

    #[test]
    fn test_builds_one_entry_per_identity() {
        let (builder, mut engine, options_seen) = setup(&[("alice.jpg", 10), ("bob.jpg", 20)]);
        let identities = vec![
            ReferenceIdentity::new("Alice", "alice.jpg"),
            ReferenceIdentity::new("Bob", "bob.jpg"),
        ];

        let gallery = builder.build(&mut engine, &identities, None);

        assert_eq!(gallery.names(), vec!["Alice", "Bob"]);
        assert_eq!(
            gallery.get("Alice").unwrap().descriptors,
            vec![Descriptor::new(vec![10.0, 0.0])]
        );
        assert!(options_seen
            .lock()
            .unwrap()
            .iter()
            .all(|o| o.single_face && o.descriptors));
    }

    #[test]
    fn test_skips_faceless_reference_and_keeps_the_rest() {
        let (builder, mut engine, _) = setup(&[("empty.jpg", 1), ("bob.jpg", 20)]);
        let identities = vec![
            ReferenceIdentity::new("Nobody", "empty.jpg"),
            ReferenceIdentity::new("Bob", "bob.jpg"),
        ];

        let gallery = builder.build(&mut engine, &identities, None);

        assert_eq!(gallery.names(), vec!["Bob"]);
    }

    #[test]
    fn test_describe_reports_no_face() {
        let (builder, mut engine, _) = setup(&[("empty.jpg", 1)]);
        let err = builder
            .describe(&mut engine, &ReferenceIdentity::new("Nobody", "empty.jpg"))
            .unwrap_err();
        assert!(matches!(err, ReferenceError::NoFaceFound(_)));
        assert!(err.to_string().contains("Nobody"));
    }

    #[test]
    fn test_skips_missing_image_and_detection_errors() {
        let (builder, mut engine, _) = setup(&[("broken.jpg", 2), ("bob.jpg", 20)]);
        let identities = vec![
            ReferenceIdentity::new("Ghost", "missing.jpg"),
            ReferenceIdentity::new("Broken", "broken.jpg"),
            ReferenceIdentity::new("Bob", "bob.jpg"),
        ];

        let gallery = builder.build(&mut engine, &identities, None);

        assert_eq!(gallery.names(), vec!["Bob"]);
    }

    #[test]
    fn test_duplicate_names_merge_descriptors() {
        let (builder, mut engine, _) = setup(&[("a1.jpg", 10), ("a2.jpg", 11)]);
        let identities = vec![
            ReferenceIdentity::new("Alice", "a1.jpg"),
            ReferenceIdentity::new("Alice", "a2.jpg"),
        ];

        let gallery = builder.build(&mut engine, &identities, None);

        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get("Alice").unwrap().descriptors.len(), 2);
    }

    #[test]
    fn test_rebuild_keeps_previous_entry_for_unavailable_image() {
        let (builder, mut engine, _) = setup(&[("bob.jpg", 20)]);
        let previous = Gallery::new(vec![
            LabeledDescriptor::new("Alice", vec![Descriptor::new(vec![1.0, 1.0])]),
            LabeledDescriptor::new("Carol", vec![Descriptor::new(vec![2.0, 2.0])]),
        ]);
        let identities = vec![
            ReferenceIdentity::new("Alice", "alice.jpg"),
            ReferenceIdentity::new("Bob", "bob.jpg"),
        ];

        let gallery = builder.build(&mut engine, &identities, Some(&previous));

        assert_eq!(gallery.names(), vec!["Bob", "Alice"]);
        assert_eq!(
            gallery.get("Alice").unwrap().descriptors,
            vec![Descriptor::new(vec![1.0, 1.0])]
        );
        assert!(gallery.get("Carol").is_none());
    }

    #[test]
    fn test_empty_identities_give_empty_gallery() {
        let (builder, mut engine, _) = setup(&[]);
        assert!(builder.build(&mut engine, &[], None).is_empty());
    }
}
