use std::fmt;

/// A controllable LED property of an access point.
///
/// Every attribute is backed by a file under `/proc` on the device. Reading
/// the file yields the current value and writing to it changes the LED state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Color,
    Brightness,
    Power,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Color, Attribute::Brightness, Attribute::Power];

    /// Remote file backing this attribute. Identical on every device.
    pub fn resource_path(self) -> &'static str {
        match self {
            Attribute::Color => "/proc/ubnt_ledbar/custom_color",
            Attribute::Brightness => "/proc/ubnt_ledbar/brightness",
            Attribute::Power => "/proc/gpio/led_pattern",
        }
    }

    /// Topic suffix used when publishing the current value.
    pub fn state_suffix(self) -> &'static str {
        match self {
            Attribute::Color => "color",
            Attribute::Brightness => "brightness",
            Attribute::Power => "power",
        }
    }

    /// Topic suffix listened on for writes.
    pub fn set_suffix(self) -> &'static str {
        match self {
            Attribute::Color => "set_color",
            Attribute::Brightness => "set_brightness",
            Attribute::Power => "set_power",
        }
    }

    pub fn from_set_suffix(suffix: &str) -> Option<Attribute> {
        Attribute::ALL
            .into_iter()
            .find(|attribute| attribute.set_suffix() == suffix)
    }

    pub fn read_command(self) -> String {
        format!("cat {}", self.resource_path())
    }

    /// Expects the new value on stdin.
    pub fn write_command(self) -> String {
        format!("cat > {}", self.resource_path())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_suffix())
    }
}
