//! The concrete source context used by the reference commands

use std::fmt;
use std::rc::Rc;

use crate::execution::{CommandError, ExecutionSource, ResultCallback};

use super::world::World;

/// Where feedback goes when the source is not silent
#[derive(Clone)]
enum Output {
    Console,
    Redirect(Rc<dyn Fn(&str)>),
}

/// Who is running a command, from where, with which permissions
#[derive(Clone)]
pub struct SourceStack {
    world: Rc<World>,
    name: Rc<str>,
    entity: Option<Rc<str>>,
    position: [f64; 3],
    dimension: Rc<str>,
    permission: u8,
    silent: bool,
    output: Output,
    callback: ResultCallback,
}

impl SourceStack {
    pub const SERVER_NAME: &'static str = "Server";
    pub const OVERWORLD: &'static str = "minecraft:overworld";
    pub const OWNER_PERMISSION: u8 = 4;

    /// The console source: full permissions, feedback to the world console
    pub fn server(world: Rc<World>) -> Self {
        SourceStack {
            world,
            name: Rc::from(Self::SERVER_NAME),
            entity: None,
            position: [0.0; 3],
            dimension: Rc::from(Self::OVERWORLD),
            permission: Self::OWNER_PERMISSION,
            silent: false,
            output: Output::Console,
            callback: ResultCallback::empty(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn shared_world(&self) -> Rc<World> {
        Rc::clone(&self.world)
    }

    /// The executing entity's name, or the source name without one
    pub fn display_name(&self) -> &str {
        self.entity.as_deref().unwrap_or(&self.name)
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn permission(&self) -> u8 {
        self.permission
    }

    /* ===================== Transforms ===================== */

    pub fn with_entity(&self, entity: &str) -> Self {
        SourceStack {
            entity: Some(Rc::from(entity)),
            ..self.clone()
        }
    }

    pub fn with_position(&self, position: [f64; 3]) -> Self {
        SourceStack {
            position,
            ..self.clone()
        }
    }

    pub fn with_dimension(&self, dimension: &str) -> Self {
        SourceStack {
            dimension: Rc::from(dimension),
            ..self.clone()
        }
    }

    pub fn with_permission(&self, permission: u8) -> Self {
        SourceStack {
            permission,
            ..self.clone()
        }
    }

    pub fn with_maximum_permission(&self, permission: u8) -> Self {
        self.with_permission(self.permission.min(permission))
    }

    pub fn with_suppressed_output(&self) -> Self {
        SourceStack {
            silent: true,
            ..self.clone()
        }
    }

    /// Send feedback to `sink` instead of the console
    pub fn with_output(&self, sink: Rc<dyn Fn(&str)>) -> Self {
        SourceStack {
            output: Output::Redirect(sink),
            ..self.clone()
        }
    }

    /* ===================== Feedback ===================== */

    fn emit(&self, text: &str) {
        match &self.output {
            Output::Console => self.world.print(self.display_name(), text),
            Output::Redirect(sink) => sink(text),
        }
    }

    pub fn send_success(&self, text: impl AsRef<str>) {
        if !self.silent {
            self.emit(text.as_ref());
        }
    }

    pub fn send_failure(&self, text: impl AsRef<str>) {
        if !self.silent {
            self.emit(&format!("Error: {}", text.as_ref()));
        }
    }
}

impl ExecutionSource for SourceStack {
    fn callback(&self) -> ResultCallback {
        self.callback.clone()
    }

    fn with_callback(&self, callback: ResultCallback) -> Self {
        SourceStack {
            callback,
            ..self.clone()
        }
    }

    fn is_silent(&self) -> bool {
        self.silent
    }

    /// Every error is logged to the world; only unforked ones are shown
    fn handle_error(&self, error: &CommandError, forked: bool) {
        let message = error.to_string();
        if !forked {
            self.send_failure(&message);
        }
        self.world.report_error(self.display_name(), message, forked);
    }

    fn report_function_result(&self, id: &str, success: bool, result: i32) {
        if success {
            self.send_success(format!("Function {id} returned {result}"));
        }
    }
}

impl fmt::Debug for SourceStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStack")
            .field("name", &self.name)
            .field("entity", &self.entity)
            .field("position", &self.position)
            .field("dimension", &self.dimension)
            .field("permission", &self.permission)
            .field("silent", &self.silent)
            .finish()
    }
}
