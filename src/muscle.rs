use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::FesResponse;

/// Group averages above this are labelled weak.
pub const WEAK_ABOVE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MuscleGroup {
    Legs,
    Glutes,
    Arms,
    Shoulders,
    Core,
}

impl MuscleGroup {
    pub const ALL: [MuscleGroup; 5] = [
        MuscleGroup::Legs,
        MuscleGroup::Glutes,
        MuscleGroup::Arms,
        MuscleGroup::Shoulders,
        MuscleGroup::Core,
    ];

    /// FES question ids exercising this group.
    pub fn questions(&self) -> &'static [u8] {
        match self {
            MuscleGroup::Legs => &[7, 8, 11, 13, 14, 15],
            MuscleGroup::Glutes => &[6],
            MuscleGroup::Arms => &[1, 2, 3, 9, 10],
            MuscleGroup::Shoulders => &[4],
            MuscleGroup::Core => &[5, 12, 16],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Legs => "Legs",
            MuscleGroup::Glutes => "Glutes",
            MuscleGroup::Arms => "Arms",
            MuscleGroup::Shoulders => "Shoulders",
            MuscleGroup::Core => "Core",
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Weak,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStrength {
    pub average_score: f64,
    pub label: Strength,
    /// Member questions with no answer; they count as 0 in the average.
    pub missing: usize,
}

pub fn muscle_strengths(response: &FesResponse) -> HashMap<MuscleGroup, GroupStrength> {
    muscle_strengths_with(response, WEAK_ABOVE)
}

pub fn muscle_strengths_with(
    response: &FesResponse,
    weak_above: f64,
) -> HashMap<MuscleGroup, GroupStrength> {
    let answers: HashMap<u8, u8> = response
        .response_details
        .iter()
        .map(|detail| (detail.question_id, detail.response_score))
        .collect();

    MuscleGroup::ALL
        .iter()
        .map(|group| {
            let members = group.questions();
            let (sum, missing) = members.iter().fold((0u32, 0usize), |(sum, missing), id| {
                match answers.get(id) {
                    Some(score) => (sum + *score as u32, missing),
                    None => (sum, missing + 1),
                }
            });
            let average_score = sum as f64 / members.len() as f64;
            let label = if average_score > weak_above {
                Strength::Weak
            } else {
                Strength::Strong
            };
            (
                *group,
                GroupStrength {
                    average_score,
                    label,
                    missing,
                },
            )
        })
        .collect()
}
