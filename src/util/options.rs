use crate::vm::{ConfigString, ExecutionEngine};

/// A type that can be looked up through the typed configuration accessors of the host.
pub trait ConfigValue: Sized {
    /// Look up `key`. `None` if the host does not know the key; `Some(Err(..))` if the host
    /// value cannot be represented.
    fn lookup(engine: &dyn ExecutionEngine, key: &str) -> Option<Result<Self, String>>;
}

impl ConfigValue for bool {
    fn lookup(engine: &dyn ExecutionEngine, key: &str) -> Option<Result<Self, String>> {
        engine.get_boolean_config_value(key).map(Ok)
    }
}

impl ConfigValue for usize {
    fn lookup(engine: &dyn ExecutionEngine, key: &str) -> Option<Result<Self, String>> {
        engine
            .get_int_config_value(key)
            .map(|v| usize::try_from(v).map_err(|_| format!("{} is out of range", v)))
    }
}

impl ConfigValue for String {
    fn lookup(engine: &dyn ExecutionEngine, key: &str) -> Option<Result<Self, String>> {
        engine
            .get_string_config_value(key)
            .map(|s| Ok(ConfigString::new(engine, s).to_string()))
    }
}

fn always_valid<T>(_: &T) -> bool {
    true
}

/// An option the host set to a value that was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOption {
    pub key: &'static str,
    pub reason: String,
}

/// The prefix of environment variables that override options, e.g. `GCBRIDGE_HEAP_COUNT=4`.
pub const ENV_PREFIX: &str = "GCBRIDGE_";

macro_rules! options {
    ($($(#[$outer:meta])* $name:ident: $type:ty [$key:literal, $validator:expr] = $default:expr),* $(,)?) => [
        /// Options of the collector. Each option has a configuration key the host is asked
        /// for, a validator, and a default.
        #[derive(Clone, Debug)]
        pub struct GcOptions {
            $($(#[$outer])* pub $name: $type),*
        }

        impl GcOptions {
            /// The host configuration keys, in declaration order.
            pub const KEYS: &'static [&'static str] = &[$($key),*];

            /// The field names, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$(stringify!($name)),*];

            /// Set an option by its field name from a string. Returns false, and keeps the
            /// current value, if the string cannot be parsed or the value is invalid.
            pub fn set_from_str(&mut self, name: &str, val: &str) -> bool {
                match name {
                    $(stringify!($name) => match val.parse::<$type>() {
                        Ok(parsed) if ($validator)(&parsed) => {
                            self.$name = parsed;
                            true
                        }
                        Ok(parsed) => {
                            warn!("Ignoring {}={:?}: invalid value. Keeping {:?}.", name, parsed, self.$name);
                            false
                        }
                        Err(_) => {
                            warn!("Ignoring {}={:?}: cannot parse it as {}.", name, val, stringify!($type));
                            false
                        }
                    },)*
                    _ => panic!("Unknown option {}", name),
                }
            }

            /// Ask the host for every option. Options the host does not know keep their value.
            /// Rejected values are returned; the caller decides how to report them.
            pub fn load_from_host(&mut self, engine: &dyn ExecutionEngine) -> Vec<InvalidOption> {
                let mut invalid = vec![];
                $(match <$type as ConfigValue>::lookup(engine, $key) {
                    None => {}
                    Some(Ok(val)) => {
                        if ($validator)(&val) {
                            self.$name = val;
                        } else {
                            invalid.push(InvalidOption { key: $key, reason: format!("invalid value {:?}", val) });
                        }
                    }
                    Some(Err(reason)) => invalid.push(InvalidOption { key: $key, reason }),
                })*
                invalid
            }

            /// Reset every option that fails its validator to its default. The options that were
            /// reset are returned.
            pub fn validate(&mut self) -> Vec<InvalidOption> {
                let mut invalid = vec![];
                $(if !($validator)(&self.$name) {
                    invalid.push(InvalidOption { key: $key, reason: format!("invalid value {:?}", self.$name) });
                    self.$name = $default;
                })*
                invalid
            }

            /// Apply the environment variables that start with [`ENV_PREFIX`] and name an
            /// option, such as `GCBRIDGE_VERIFY_ROOT_SCAN`.
            pub fn read_env_var_settings(&mut self) {
                for (key, val) in std::env::vars() {
                    let Some(name) = key.strip_prefix(ENV_PREFIX).map(str::to_lowercase) else {
                        continue;
                    };
                    if Self::NAMES.contains(&name.as_str()) {
                        self.set_from_str(&name, &val);
                    }
                }
            }
        }

        impl Default for GcOptions {
            fn default() -> Self {
                GcOptions {
                    $($name: $default),*
                }
            }
        }
    ]
}

options! {
    /// Use one heap per core and dedicated collector threads.
    server_gc:          bool    ["gcServer", always_valid] = false,
    /// Allow background collections.
    concurrent_gc:      bool    ["gcConcurrent", always_valid] = true,
    /// Number of heaps for server collection.
    heap_count:         usize   ["GCHeapCount", |v: &usize| *v > 0] = num_cpus::get(),
    /// Size of generation 0 in bytes. 0 lets the collector decide.
    gen0_size:          usize   ["GCgen0size", always_valid] = 0,
    /// Hard limit of the heap size in bytes. 0 means no limit.
    heap_hard_limit:    usize   ["GCHeapHardLimit", always_valid] = 0,
    /// Reject roots that are reported twice in one scan. Each reported slot is recorded in a
    /// hash set while the world is stopped, so root reporting allocates when this is on.
    verify_root_scan:   bool    ["GCVerifyRootScan", always_valid] = cfg!(any(debug_assertions, feature = "extreme_assertions")),
    /// Polls of a suspension between two warnings about threads that do not stop.
    suspend_warn_polls: usize   ["GCSuspendWarnPolls", |v: &usize| *v > 0] = 100_000,
    /// Write the built-in logger output to this file instead of stderr.
    log_file:           String  ["GCLogFile", always_valid] = String::new(),
}
