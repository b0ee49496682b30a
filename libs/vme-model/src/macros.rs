/// Declares a fieldless enum with fixed wire discriminants plus
/// `as_raw`/`from_raw`, `ALL` and a `TryFrom` that rejects unknown values.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub const fn as_raw(self) -> $repr {
                self as $repr
            }

            pub fn from_raw(raw: $repr) -> Option<Self> {
                match raw {
                    $( v if v == $value => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = vme_errors::VmeError;

            fn try_from(raw: $repr) -> Result<Self, Self::Error> {
                Self::from_raw(raw).ok_or_else(|| {
                    vme_errors::VmeError::invalid_param(stringify!($name), format!("{:#x}", raw))
                })
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> $repr {
                value.as_raw()
            }
        }
    };
}
