use super::ConfigErrors;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Read-only property bag of a single task type
///
/// Values may be given as native YAML scalars or as strings, i.e., `iterations: 4` and
/// `iterations: "4"` are equivalent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskConfiguration {
    task_type: String,
    values: BTreeMap<String, Value>,
}

fn malformed(key: &str, expected: &'static str) -> ConfigErrors {
    ConfigErrors::MalformedProperty {
        key: key.to_owned(),
        expected,
    }
}

impl TaskConfiguration {
    pub fn new(task_type: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            task_type: task_type.into(),
            values,
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn value(&self, key: &str) -> Result<&Value, ConfigErrors> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigErrors::MissingProperty(key.to_owned()))
    }

    pub fn get_property(&self, key: &str) -> Result<String, ConfigErrors> {
        match self.value(key)? {
            Value::String(value) => Ok(value.clone()),
            Value::Number(value) => Ok(value.to_string()),
            Value::Bool(value) => Ok(value.to_string()),
            _ => Err(malformed(key, "a scalar")),
        }
    }

    pub fn get_long(&self, key: &str) -> Result<i64, ConfigErrors> {
        match self.value(key)? {
            Value::Number(value) => value.as_i64().ok_or_else(|| malformed(key, "an integer")),
            Value::String(value) => value
                .trim()
                .parse()
                .map_err(|_| malformed(key, "an integer")),
            _ => Err(malformed(key, "an integer")),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i32, ConfigErrors> {
        i32::try_from(self.get_long(key)?).map_err(|_| malformed(key, "a 32 bit integer"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigErrors> {
        match self.value(key)? {
            Value::Bool(value) => Ok(*value),
            Value::String(value) => match value.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(malformed(key, "a boolean")),
            },
            _ => Err(malformed(key, "a boolean")),
        }
    }

    /// non-negative integer property, e.g., counts and sizes
    pub fn get_count(&self, key: &str) -> Result<u64, ConfigErrors> {
        u64::try_from(self.get_long(key)?).map_err(|_| malformed(key, "a non-negative integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration(yaml: &str) -> TaskConfiguration {
        TaskConfiguration::new("test", serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn native_and_string_values() {
        let conf = configuration(
            "iterations: 4\nfile.length.bytes: \"1048576\"\nshuffle.mode: \"TRUE\"\nwork.dir: /tmp/perf\nflag: false",
        );

        assert_eq!(conf.get_int("iterations").unwrap(), 4);
        assert_eq!(conf.get_long("file.length.bytes").unwrap(), 1_048_576);
        assert!(conf.get_bool("shuffle.mode").unwrap());
        assert!(!conf.get_bool("flag").unwrap());
        assert_eq!(conf.get_property("work.dir").unwrap(), "/tmp/perf");
        assert_eq!(conf.get_property("iterations").unwrap(), "4");
    }

    #[test]
    fn missing_property() {
        let conf = configuration("a: 1");

        assert!(matches!(
            conf.get_int("b"),
            Err(ConfigErrors::MissingProperty(key)) if key == "b"
        ));
    }

    #[test]
    fn malformed_properties() {
        let conf = configuration("a: abc\nb: 5000000000\nc: -1\nd: [1, 2]\ne: maybe");

        assert!(matches!(conf.get_long("a"), Err(ConfigErrors::MalformedProperty { .. })));
        assert!(matches!(conf.get_int("b"), Err(ConfigErrors::MalformedProperty { .. })));
        assert_eq!(conf.get_long("b").unwrap(), 5_000_000_000);
        assert!(matches!(conf.get_count("c"), Err(ConfigErrors::MalformedProperty { .. })));
        assert!(matches!(conf.get_property("d"), Err(ConfigErrors::MalformedProperty { .. })));
        assert!(matches!(conf.get_bool("e"), Err(ConfigErrors::MalformedProperty { .. })));
    }
}
