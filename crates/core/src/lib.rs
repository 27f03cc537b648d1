//! Core library for the saber preview tool.
//!
//! The crate holds the orchestration layer of the viewer: the parameter store
//! every setting lives in, the bindings that keep on-screen controls and the
//! renderer in step with it, the blade on/off animation and the photo capture
//! transaction. Rendering, the scene graph and the control surface are
//! collaborators behind traits, with headless implementations used by the
//! command line front-end and the tests.

pub mod bindings;
pub mod capture;
pub mod color;
pub mod config;
pub mod error;
pub mod params;
pub mod render;
pub mod scene;
pub mod session;
pub mod shared;
pub mod timeline;
pub mod toggle;

pub use bindings::{Binding, ControlBindingRegistry, ControlEvent, ControlPanel, ControlSurface, Direction};
pub use capture::{CaptureCoordinator, CaptureNaming, CaptureOutput, CaptureRequest, FrameEncoder};
pub use color::Color;
pub use config::{AppConfig, ModelState, SceneSettings};
pub use error::{CaptureStage, PreviewError, Result};
pub use params::{ParamValue, Parameter, ParameterStore, SettingsSnapshot};
pub use render::{Extent, HeadlessRenderer, Renderer};
pub use scene::{Scene, SceneGraph};
pub use session::PreviewSession;
pub use shared::{SharedRenderer, SharedScene, SharedSurface};
pub use timeline::{FrameClock, FrameTick};
pub use toggle::{ToggleAnimator, ToggleState};
