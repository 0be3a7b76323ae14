// Http hands requests to the shell as `crux_http::protocol::HttpRequest`;
// Render only tells the shell to re-read the view model.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
use crate::App;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
