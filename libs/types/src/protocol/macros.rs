//! Message Table Generation Macro
//!
//! Provides the `define_messages!` macro that turns one declarative table of
//! `Variant = "WIRE_NAME", Kind, PayloadType;` rows into:
//!
//! - the fieldless [`MessageType`](super::MessageType) tag enum with its wire
//!   name, kind and `FromStr`;
//! - the [`Body`](super::Body) sum type with one variant per tag carrying the
//!   payload;
//! - the per-tag decode rule (`Body::decode`), encode rule (`Body::to_value`)
//!   and empty-body constructor (`Body::empty`).
//!
//! Because every generated `match` is exhaustive, adding a row without a
//! payload, or a tag without a decode rule, cannot compile.

macro_rules! define_messages {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident = $wire:literal, $kind:ident, $payload:ty;
        )+
    ) => {
        /// Closed set of message types understood by the gateway protocol
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MessageType {
            $(
                $(#[$meta])*
                $variant,
            )+
        }

        impl MessageType {
            /// Every message type, in table order
            pub const ALL: &'static [MessageType] = &[$(MessageType::$variant,)+];

            /// Wire name carried in the `Type` field
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(MessageType::$variant => $wire,)+
                }
            }

            /// Whether this type is a request, a response or a return
            pub fn kind(&self) -> MessageKind {
                match self {
                    $(MessageType::$variant => MessageKind::$kind,)+
                }
            }
        }

        impl std::str::FromStr for MessageType {
            type Err = UnknownMessageType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(MessageType::$variant),)+
                    other => Err(UnknownMessageType(other.to_string())),
                }
            }
        }

        /// Typed message payload; the variant is the message type
        #[derive(Debug, Clone, PartialEq)]
        pub enum Body {
            $(
                $(#[$meta])*
                $variant($payload),
            )+
        }

        impl Body {
            /// Tag of this payload
            pub fn message_type(&self) -> MessageType {
                match self {
                    $(Body::$variant(_) => MessageType::$variant,)+
                }
            }

            /// Decode a JSON payload according to `message_type`'s shape.
            ///
            /// `null` decodes to the payload's default value, as does `{}` when
            /// the payload has no object form.
            pub fn decode(
                message_type: MessageType,
                value: serde_json::Value,
            ) -> Result<Body, serde_json::Error> {
                match message_type {
                    $(MessageType::$variant => decode_payload::<$payload>(value).map(Body::$variant),)+
                }
            }

            /// Encode the payload as a JSON value
            pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
                match self {
                    $(Body::$variant(payload) => serde_json::to_value(payload),)+
                }
            }

            /// Payload-less body for `message_type` (used for error replies)
            pub fn empty(message_type: MessageType) -> Body {
                match message_type {
                    $(MessageType::$variant => Body::$variant(<$payload>::default()),)+
                }
            }
        }
    };
}
