// crates/capdeck-ui/src/modules/mod.rs
//
// Module registry. To add a new panel:
//   1. Create modules/mypanel.rs implementing PanelModule
//   2. Add `pub mod mypanel;` below
//   3. Show it from the panel layout in app.rs

pub mod controls;
pub mod library;
pub mod player;
pub mod preview_module;
pub mod toasts;

use capdeck_core::commands::AppCommand;
use capdeck_core::state::CaptureState;
use egui::Ui;

use crate::context::AppContext;

/// Every panel implements this trait.
/// Modules read state, emit commands — they never mutate state directly.
/// Runtime handles (textures, level meters) are read from AppContext.
pub trait PanelModule {
    fn name(&self) -> &str;
    fn ui(
        &mut self,
        ui:    &mut Ui,
        state: &CaptureState,
        actx:  &AppContext,
        cmd:   &mut Vec<AppCommand>,
    );
}
