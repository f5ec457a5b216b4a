use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Serialize, Serializer};

/// Declares a closed label set with its wire strings, in model class-index order.
macro_rules! label_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Map a detector class index (model output order) to a label.
            pub fn from_index(index: usize) -> Result<Self> {
                Self::ALL.get(index).copied().ok_or_else(|| {
                    anyhow!(
                        "class index {} out of range for {} ({} classes)",
                        index,
                        stringify!($name),
                        Self::ALL.len()
                    )
                })
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|label| label.as_str() == s)
                    .ok_or_else(|| anyhow!("unknown {} label '{}'", stringify!($name), s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

label_set!(
    /// Vehicle classes produced by the vehicle detector.
    VehicleClass {
        Bus => "bus",
        Car => "car",
        Truck => "truck",
        Van => "van",
    }
);

label_set!(
    /// Body damage classes produced by the damage detector.
    DamageClass {
        FrontWindscreenDamage => "Front-windscreen-damage",
        HeadlightDamage => "Headlight-damage",
        RearWindscreenDamage => "Rear-windscreen-Damage",
        RunningboardDamage => "Runningboard-Damage",
        SidemirrorDamage => "Sidemirror-Damage",
        TaillightDamage => "Taillight-Damage",
        BonnetDent => "bonnet-dent",
        BootDent => "boot-dent",
        DoorouterDent => "doorouter-dent",
        FenderDent => "fender-dent",
        FrontBumperDent => "front-bumper-dent",
        QuaterpanelDent => "quaterpanel-dent",
        RearBumperDent => "rear-bumper-dent",
        RoofDent => "roof-dent",
    }
);

label_set!(
    /// Brand classes produced by the brand detector.
    BrandClass {
        Bmw => "BMW",
        Honda => "Honda",
        Hyundai => "Hyundai",
        Mazda => "Mazda",
        MercedesBenz => "MercedesBenz",
        Perodua => "Perodua",
        Proton => "Proton",
        Toyota => "Toyota",
        Volkswagen => "Volkswagen",
    }
);

/// Label of any detection, tagged by the detector family that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Vehicle(VehicleClass),
    Plate,
    Damage(DamageClass),
    Brand(BrandClass),
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Vehicle(class) => class.as_str(),
            Label::Plate => "plate",
            Label::Damage(class) => class.as_str(),
            Label::Brand(class) => class.as_str(),
        }
    }

    pub fn as_damage(&self) -> Option<DamageClass> {
        match self {
            Label::Damage(class) => Some(*class),
            _ => None,
        }
    }

    pub fn as_brand(&self) -> Option<BrandClass> {
        match self {
            Label::Brand(class) => Some(*class),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which label set a detector maps its class indices into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelFamily {
    Vehicle,
    Plate,
    Damage,
    Brand,
}

impl LabelFamily {
    pub fn label_for_index(&self, index: usize) -> Result<Label> {
        Ok(match self {
            LabelFamily::Vehicle => Label::Vehicle(VehicleClass::from_index(index)?),
            LabelFamily::Plate => Label::Plate,
            LabelFamily::Damage => Label::Damage(DamageClass::from_index(index)?),
            LabelFamily::Brand => Label::Brand(BrandClass::from_index(index)?),
        })
    }

    pub fn class_count(&self) -> usize {
        match self {
            LabelFamily::Vehicle => VehicleClass::ALL.len(),
            LabelFamily::Plate => 1,
            LabelFamily::Damage => DamageClass::ALL.len(),
            LabelFamily::Brand => BrandClass::ALL.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_indices_follow_model_order() {
        assert_eq!(VehicleClass::from_index(1).unwrap(), VehicleClass::Car);
        assert_eq!(DamageClass::from_index(13).unwrap(), DamageClass::RoofDent);
        assert_eq!(BrandClass::from_index(7).unwrap(), BrandClass::Toyota);
        assert!(VehicleClass::from_index(4).is_err());
    }

    #[test]
    fn wire_strings_round_trip() {
        for class in DamageClass::ALL {
            assert_eq!(class.as_str().parse::<DamageClass>().unwrap(), *class);
        }
        assert!("tank".parse::<VehicleClass>().is_err());
    }

    #[test]
    fn plate_family_ignores_index() {
        assert_eq!(LabelFamily::Plate.label_for_index(3).unwrap(), Label::Plate);
        assert_eq!(
            LabelFamily::Brand.label_for_index(0).unwrap(),
            Label::Brand(BrandClass::Bmw)
        );
        assert_eq!(LabelFamily::Damage.class_count(), 14);
    }

    #[test]
    fn serializes_to_wire_string() {
        let value = serde_json::to_value(Label::Brand(BrandClass::MercedesBenz)).unwrap();
        assert_eq!(value, "MercedesBenz");
    }
}
