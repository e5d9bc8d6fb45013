use crate::detection::domain::face_observation::FaceObservation;
use crate::overlay::domain::overlay_surface::{Color, OverlaySurface};
use crate::recognition::domain::identity_matcher::MatchResult;
use crate::shared::constants::MIN_EXPRESSION_CONFIDENCE;

/// Draws per-face annotations for one detection cycle.
///
/// Every render starts from a cleared surface and draws in three passes:
/// labeled boxes, then landmarks, then expression fields.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    box_color: Color,
    landmark_color: Color,
    text_color: Color,
    min_expression_probability: f32,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            box_color: Color::RED,
            landmark_color: Color::CYAN,
            text_color: Color::WHITE,
            min_expression_probability: MIN_EXPRESSION_CONFIDENCE,
        }
    }

    pub fn with_box_color(mut self, color: Color) -> Self {
        self.box_color = color;
        self
    }

    pub fn render(&self, surface: &mut dyn OverlaySurface, faces: &[(FaceObservation, MatchResult)]) {
        surface.clear();

        for (face, matched) in faces {
            surface.draw_box(&face.bounding_box, &box_label(face, matched), self.box_color);
        }

        for (face, _) in faces {
            if !face.landmarks.is_empty() {
                surface.draw_points(&face.landmarks, self.landmark_color);
            }
        }

        for (face, _) in faces {
            let lines = expression_lines(face, self.min_expression_probability);
            if !lines.is_empty() {
                surface.draw_text(&lines, face.bounding_box.bottom_left(), self.text_color);
            }
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// `"<identity> Age: <n> <gender>"`, omitting whatever the face lacks.
pub fn box_label(face: &FaceObservation, matched: &MatchResult) -> String {
    let mut label = matched.label().to_string();
    if let Some(age) = face.age {
        label.push_str(&format!(" Age: {}", age.round() as i64));
    }
    if let Some(gender) = &face.gender {
        label.push_str(&format!(" {}", gender.gender));
    }
    label
}

fn expression_lines(face: &FaceObservation, min_probability: f32) -> Vec<String> {
    face.expressions
        .as_ref()
        .map(|expressions| {
            expressions
                .ranked_above(min_probability)
                .into_iter()
                .map(|(expression, probability)| format!("{expression} ({probability:.2})"))
                .collect()
        })
        .unwrap_or_default()
}
