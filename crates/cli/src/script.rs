//! Event scripts for replaying a session without a window.
//!
//! A script is a JSON array of steps in device pixels of the page raster, e.g.
//! `[{"click": {"x": 40, "y": 80}}, "toggle_selection", {"drag": {"from": [0, 0], "to": [60, 30]}}]`.

use anyhow::{Context, Result};
use bubble_core::{DevicePoint, SessionAction};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Click { x: f32, y: f32 },
    Drag { from: [f32; 2], to: [f32; 2] },
    ToggleSelection,
    NextPage,
    PreviousPage,
    ClearPage,
    ClearAll,
}

impl Step {
    /// The pointer and key events this step stands for.
    pub fn actions(&self) -> Vec<SessionAction> {
        match *self {
            Step::Click { x, y } => {
                let point = DevicePoint::new(x, y);
                vec![SessionAction::Press(point), SessionAction::Release(point)]
            }
            Step::Drag { from, to } => {
                let start = DevicePoint::new(from[0], from[1]);
                let end = DevicePoint::new(to[0], to[1]);
                vec![SessionAction::Press(start), SessionAction::MoveTo(end), SessionAction::Release(end)]
            }
            Step::ToggleSelection => vec![SessionAction::ToggleSelectionMode],
            Step::NextPage => vec![SessionAction::NextPage],
            Step::PreviousPage => vec![SessionAction::PreviousPage],
            Step::ClearPage => vec![SessionAction::ClearPage],
            Step::ClearAll => vec![SessionAction::ClearAll],
        }
    }
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid script {}", path.display()))
}
