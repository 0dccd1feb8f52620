//! Command catalog. Each subcommand maps to a pure plan: the extension it
//! needs and the snippet to run. Rendering lives in `render`.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use serde_json::{json, Value};

use cachetool_core::domain::{php_literal, Code, ReturnConvention};

pub const APC: &str = "apc";
pub const OPCACHE: &str = "Zend OPcache";

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Get a binary dump of files and user variables
    #[command(name = "apc:bin:dump")]
    ApcBinDump {
        /// Destination file on the target host
        file: PathBuf,
    },

    /// Load a binary dump into the APC file and user variables
    #[command(name = "apc:bin:load")]
    ApcBinLoad {
        /// Dump file on the target host
        file: PathBuf,
    },

    /// Clear APC cache
    #[command(name = "apc:cache:clear")]
    ApcCacheClear {
        #[arg(value_enum, default_value_t = ClearTarget::All)]
        target: ClearTarget,
    },

    /// Show APC cache information
    #[command(name = "apc:cache:info")]
    ApcCacheInfo {
        #[arg(value_enum, default_value_t = CacheKind::Opcode)]
        kind: CacheKind,
    },

    /// Show APC file cache information
    #[command(name = "apc:cache:info:file")]
    ApcCacheInfoFile,

    /// Delete an APC key
    #[command(name = "apc:key:delete")]
    ApcKeyDelete { key: String },

    /// Check if an APC key exists
    #[command(name = "apc:key:exists")]
    ApcKeyExists { key: String },

    /// Show the content of an APC key
    #[command(name = "apc:key:fetch")]
    ApcKeyFetch { key: String },

    /// Store an APC key with the given value
    #[command(name = "apc:key:store")]
    ApcKeyStore {
        key: String,
        value: String,
        /// Time to live in seconds, 0 keeps the entry until cleared
        #[arg(default_value_t = 0)]
        ttl: u64,
    },

    /// Show APC shared memory allocation information
    #[command(name = "apc:sma:info")]
    ApcSmaInfo,

    /// Get configuration information about the cache
    #[command(name = "opcache:configuration")]
    OpcacheConfiguration,

    /// Reset the contents of the opcode cache
    #[command(name = "opcache:reset")]
    OpcacheReset,

    /// Show summary information about the opcode cache
    #[command(name = "opcache:status")]
    OpcacheStatus,

    /// Show scripts in the opcode cache
    #[command(name = "opcache:status:scripts")]
    OpcacheStatusScripts,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    User,
    Opcode,
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    User,
    Opcode,
}

impl CacheKind {
    fn as_str(&self) -> &'static str {
        match self {
            CacheKind::User => "user",
            CacheKind::Opcode => "opcode",
        }
    }
}

/// What a command needs from the remote runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub capability: &'static str,
    pub code: Code,
}

impl Plan {
    fn apc(code: Code) -> Self {
        Self {
            capability: APC,
            code,
        }
    }

    fn opcache(code: Code) -> Self {
        Self {
            capability: OPCACHE,
            code,
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ApcBinDump { .. } => "apc:bin:dump",
            Command::ApcBinLoad { .. } => "apc:bin:load",
            Command::ApcCacheClear { .. } => "apc:cache:clear",
            Command::ApcCacheInfo { .. } => "apc:cache:info",
            Command::ApcCacheInfoFile => "apc:cache:info:file",
            Command::ApcKeyDelete { .. } => "apc:key:delete",
            Command::ApcKeyExists { .. } => "apc:key:exists",
            Command::ApcKeyFetch { .. } => "apc:key:fetch",
            Command::ApcKeyStore { .. } => "apc:key:store",
            Command::ApcSmaInfo => "apc:sma:info",
            Command::OpcacheConfiguration => "opcache:configuration",
            Command::OpcacheReset => "opcache:reset",
            Command::OpcacheStatus => "opcache:status",
            Command::OpcacheStatusScripts => "opcache:status:scripts",
        }
    }

    pub fn plan(&self) -> Plan {
        use ReturnConvention::{Raw, Scalar, Structured};

        match self {
            Command::ApcBinDump { file } => Plan::apc(Code::call(
                "apc_bin_dumpfile",
                &[Value::Null, Value::Null, path_value(file)],
                Scalar,
            )),
            Command::ApcBinLoad { file } => {
                Plan::apc(Code::call("apc_bin_loadfile", &[path_value(file)], Scalar))
            }
            Command::ApcCacheClear { target } => Plan::apc(match target {
                ClearTarget::User => Code::call("apc_clear_cache", &[json!("user")], Scalar),
                ClearTarget::Opcode => Code::call("apc_clear_cache", &[json!("opcode")], Scalar),
                ClearTarget::All => Code::expression(
                    "apc_clear_cache('user') && apc_clear_cache('opcode')",
                    Scalar,
                ),
            }),
            Command::ApcCacheInfo { kind } => Plan::apc(Code::call(
                "apc_cache_info",
                &[json!(kind.as_str()), json!(true)],
                Structured,
            )),
            Command::ApcCacheInfoFile => {
                Plan::apc(Code::call("apc_cache_info", &[json!("opcode")], Structured))
            }
            Command::ApcKeyDelete { key } => {
                Plan::apc(Code::call("apc_delete", &[json!(key)], Scalar))
            }
            Command::ApcKeyExists { key } => {
                Plan::apc(Code::call("apc_exists", &[json!(key)], Scalar))
            }
            Command::ApcKeyFetch { key } => Plan::apc(Code::expression(
                format!("var_export(apc_fetch({}), true)", php_literal(&json!(key))),
                Raw,
            )),
            Command::ApcKeyStore { key, value, ttl } => Plan::apc(Code::call(
                "apc_store",
                &[json!(key), json!(value), json!(ttl)],
                Scalar,
            )),
            Command::ApcSmaInfo => Plan::apc(Code::call("apc_sma_info", &[json!(true)], Structured)),
            Command::OpcacheConfiguration => Plan::opcache(Code::call(
                "opcache_get_configuration",
                &[],
                Structured,
            )),
            Command::OpcacheReset => Plan::opcache(Code::call("opcache_reset", &[], Scalar)),
            Command::OpcacheStatus => Plan::opcache(Code::call(
                "opcache_get_status",
                &[json!(false)],
                Structured,
            )),
            Command::OpcacheStatusScripts => Plan::opcache(Code::call(
                "opcache_get_status",
                &[json!(true)],
                Structured,
            )),
        }
    }
}

fn path_value(path: &std::path::Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert_eq!(Command::ApcSmaInfo.plan().capability, "apc");
        assert_eq!(Command::OpcacheStatus.plan().capability, "Zend OPcache");
        assert_eq!(
            Command::ApcKeyDelete {
                key: "k".to_string()
            }
            .plan()
            .capability,
            "apc"
        );
    }

    #[test]
    fn test_bin_dump_targets_everything() {
        let plan = Command::ApcBinDump {
            file: PathBuf::from("/tmp/apc.bin"),
        }
        .plan();

        assert_eq!(
            plan.code.body(),
            "$result = apc_bin_dumpfile(null, null, '/tmp/apc.bin');\n"
        );
        assert_eq!(plan.code.convention(), ReturnConvention::Scalar);
    }

    #[test]
    fn test_key_arguments_are_quoted() {
        let plan = Command::ApcKeyStore {
            key: "it's".to_string(),
            value: "v".to_string(),
            ttl: 30,
        }
        .plan();

        assert_eq!(plan.code.body(), "$result = apc_store('it\\'s', 'v', 30);\n");
    }

    #[test]
    fn test_fetch_is_raw_export() {
        let plan = Command::ApcKeyFetch {
            key: "config".to_string(),
        }
        .plan();

        assert_eq!(
            plan.code.body(),
            "$result = var_export(apc_fetch('config'), true);\n"
        );
        assert_eq!(plan.code.convention(), ReturnConvention::Raw);
    }

    #[test]
    fn test_clear_all_clears_both_caches() {
        let plan = Command::ApcCacheClear {
            target: ClearTarget::All,
        }
        .plan();

        assert!(plan.code.body().contains("apc_clear_cache('user')"));
        assert!(plan.code.body().contains("apc_clear_cache('opcode')"));
    }

    #[test]
    fn test_status_excludes_scripts() {
        assert_eq!(
            Command::OpcacheStatus.plan().code.body(),
            "$result = opcache_get_status(false);\n"
        );
        assert_eq!(
            Command::OpcacheStatusScripts.plan().code.body(),
            "$result = opcache_get_status(true);\n"
        );
    }
}
