//! Enumerated value model.
//!
//! Every enumerated type is a closed set of `(code, label)` pairs. Inbound
//! values carry the integer code; presentation uses the label. Each type gets
//! a static [`EnumInfo`] so descriptors can reference it without generics.

use std::fmt;

use crate::error::{Error, Result};

/// Type-erased view of an enumerated type, referenced by descriptors.
pub struct EnumInfo {
    /// Type name, used to reference the enum from descriptor tables
    pub name: &'static str,
    /// Declared `(code, label)` pairs in declaration order
    pub entries: &'static [(i64, &'static str)],
}

impl EnumInfo {
    /// Display labels in declaration order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(_, label)| *label).collect()
    }

    /// Wire codes in declaration order.
    pub fn codes(&self) -> Vec<i64> {
        self.entries.iter().map(|(code, _)| *code).collect()
    }

    pub fn label_for(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }

    pub fn code_for(&self, label: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(code, _)| *code)
    }

    pub fn contains(&self, code: i64) -> bool {
        self.entries.iter().any(|(c, _)| *c == code)
    }
}

impl fmt::Debug for EnumInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for EnumInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A closed set of values encoded as an integer code plus a label.
pub trait VictronEnum: Copy + Sized + 'static {
    /// Static description of the type.
    const INFO: &'static EnumInfo;

    fn code(&self) -> i64;

    fn label(&self) -> &'static str;

    /// All variants in declaration order.
    fn variants() -> &'static [Self];

    /// Reverse lookup. Fails with [`Error::UnknownEnumCode`] outside the declared set.
    fn from_code(code: i64) -> Result<Self>;
}

/// Declare an enumerated type with `(code, label)` pairs.
///
/// Generates the enum, a build-once code lookup table, a [`VictronEnum`]
/// implementation and a `Display` rendering the label.
#[macro_export]
macro_rules! victron_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = ($code:expr, $label:expr)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            const ENTRIES: &'static [(i64, &'static str)] = &[$(($code, $label)),+];
            const VARIANTS: &'static [$name] = &[$($name::$variant),+];

            fn by_code() -> &'static ::std::collections::HashMap<i64, $name> {
                static TABLE: ::once_cell::sync::Lazy<::std::collections::HashMap<i64, $name>> =
                    ::once_cell::sync::Lazy::new(|| {
                        $name::VARIANTS
                            .iter()
                            .map(|v| ($crate::enums::VictronEnum::code(v), *v))
                            .collect()
                    });
                &TABLE
            }
        }

        impl $crate::enums::VictronEnum for $name {
            const INFO: &'static $crate::enums::EnumInfo = &$crate::enums::EnumInfo {
                name: stringify!($name),
                entries: $name::ENTRIES,
            };

            fn code(&self) -> i64 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            fn variants() -> &'static [Self] {
                $name::VARIANTS
            }

            fn from_code(code: i64) -> $crate::error::Result<Self> {
                $name::by_code()
                    .get(&code)
                    .copied()
                    .ok_or($crate::error::Error::UnknownEnumCode {
                        enum_name: stringify!($name),
                        code,
                    })
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::enums::VictronEnum::label(self))
            }
        }
    };
}

victron_enum! {
    /// On/Off switch state.
    pub enum GenericOnOff {
        Off = (0, "Off"),
        On = (1, "On"),
    }
}

victron_enum! {
    /// Inverter operating mode.
    pub enum InverterMode {
        ChargerOnly = (1, "Charger Only"),
        InverterOnly = (2, "Inverter Only"),
        On = (3, "On"),
        Off = (4, "Off"),
    }
}

victron_enum! {
    /// ESS grid-feed control mode.
    pub enum Hub4Mode {
        PhaseCompensation = (1, "Optimized with phase compensation"),
        NoPhaseCompensation = (2, "Optimized without phase compensation"),
        ExternalControl = (3, "External control"),
    }
}

victron_enum! {
    /// EV charger mode.
    pub enum EvChargerMode {
        Manual = (0, "Manual"),
        Auto = (1, "Auto"),
        ScheduledCharge = (2, "Scheduled Charge"),
    }
}

victron_enum! {
    /// Energy Storage System operating mode.
    pub enum EssMode {
        OptimizedWithBatteryLife = (1, "Optimized (with BatteryLife)"),
        OptimizedWithoutBatteryLife = (2, "Optimized (without BatteryLife)"),
        KeepBatteriesCharged = (3, "Keep batteries charged"),
        ExternalControl = (4, "External control"),
    }
}

/// Every enumerated type known to descriptor tables.
pub fn all_enums() -> [&'static EnumInfo; 5] {
    [
        GenericOnOff::INFO,
        InverterMode::INFO,
        Hub4Mode::INFO,
        EvChargerMode::INFO,
        EssMode::INFO,
    ]
}

/// Resolve an enumerated type by name.
pub fn lookup_enum(name: &str) -> Result<&'static EnumInfo> {
    all_enums()
        .into_iter()
        .find(|info| info.name == name)
        .ok_or_else(|| Error::UnknownEnum(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_label() {
        assert_eq!(EssMode::KeepBatteriesCharged.code(), 3);
        assert_eq!(EssMode::KeepBatteriesCharged.label(), "Keep batteries charged");
        assert_eq!(InverterMode::ChargerOnly.to_string(), "Charger Only");
    }

    #[test]
    fn test_from_code() {
        assert_eq!(GenericOnOff::from_code(1).unwrap(), GenericOnOff::On);
        assert_eq!(EvChargerMode::from_code(2).unwrap(), EvChargerMode::ScheduledCharge);

        for mode in InverterMode::variants() {
            assert_eq!(InverterMode::from_code(mode.code()).unwrap(), *mode);
        }
    }

    #[test]
    fn test_from_code_outside_declared_set() {
        let err = InverterMode::from_code(0).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownEnumCode { enum_name: "InverterMode", code: 0 }
        ));
    }

    #[test]
    fn test_enum_info() {
        let info = EssMode::INFO;
        assert_eq!(info.name, "EssMode");
        assert_eq!(info.labels().len(), 4);
        assert_eq!(info.labels()[0], "Optimized (with BatteryLife)");
        assert_eq!(info.label_for(4), Some("External control"));
        assert_eq!(info.code_for("Keep batteries charged"), Some(3));
        assert!(!info.contains(0));
    }

    #[test]
    fn test_lookup_enum() {
        assert_eq!(lookup_enum("GenericOnOff").unwrap(), GenericOnOff::INFO);
        assert!(matches!(lookup_enum("Nope"), Err(Error::UnknownEnum(_))));
    }
}
