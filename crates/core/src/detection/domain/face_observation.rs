//! Per-cycle face observation produced by a perception engine.
//!
//! Optional attributes are explicit `Option` fields: the overlay draws only
//! what an engine actually produced for the requested feature set.

use crate::recognition::domain::descriptor::Descriptor;
use crate::shared::face_box::{BoundingBox, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expression label to probability mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expressions {
    scores: Vec<(Expression, f32)>,
}

impl Expressions {
    /// Later duplicates of an expression overwrite earlier ones.
    pub fn new(scores: impl IntoIterator<Item = (Expression, f32)>) -> Self {
        let mut result = Self::default();
        for (expression, probability) in scores {
            match result.scores.iter_mut().find(|(e, _)| *e == expression) {
                Some(slot) => slot.1 = probability,
                None => result.scores.push((expression, probability)),
            }
        }
        result
    }

    pub fn probability(&self, expression: Expression) -> Option<f32> {
        self.scores
            .iter()
            .find(|(e, _)| *e == expression)
            .map(|(_, p)| *p)
    }

    pub fn dominant(&self) -> Option<(Expression, f32)> {
        self.scores
            .iter()
            .copied()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Expressions with probability at or above `min`, most likely first.
    pub fn ranked_above(&self, min: f32) -> Vec<(Expression, f32)> {
        let mut ranked: Vec<(Expression, f32)> =
            self.scores.iter().copied().filter(|(_, p)| *p >= min).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenderEstimate {
    pub gender: Gender,
    pub probability: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub score: f64,
    pub landmarks: Vec<Point>,
    pub descriptor: Option<Descriptor>,
    pub expressions: Option<Expressions>,
    pub age: Option<f32>,
    pub gender: Option<GenderEstimate>,
}

impl FaceObservation {
    /// A bare detection: box and score, nothing else extracted yet.
    pub fn new(bounding_box: BoundingBox, score: f64) -> Self {
        Self {
            bounding_box,
            score,
            landmarks: Vec::new(),
            descriptor: None,
            expressions: None,
            age: None,
            gender: None,
        }
    }

    /// Maps geometry by `(sx, sy)`; attributes are carried over untouched.
    pub fn scaled(&self, sx: f64, sy: f64) -> FaceObservation {
        FaceObservation {
            bounding_box: self.bounding_box.scaled(sx, sy),
            landmarks: self.landmarks.iter().map(|p| p.scaled(sx, sy)).collect(),
            ..self.clone()
        }
    }
}
