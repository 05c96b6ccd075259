use courier::SendOptions;
use envconfig::Envconfig;

#[derive(Envconfig)]
pub(crate) struct Config {
    /// Used when `RUST_LOG` is not set.
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    #[envconfig(from = "PUBLISH_EVENTS", default = "true")]
    pub publish_events: bool,
}

impl Config {
    pub(crate) fn send_options(&self) -> SendOptions {
        SendOptions {
            publish_events: self.publish_events,
        }
    }
}
