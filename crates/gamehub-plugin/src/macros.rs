//! Convenience macros for plugin development.

/// Exports a package from a `cdylib` so the dynamic loader can open it.
///
/// # Example
/// ```rust,ignore
/// declare_plugin!(SamplePackage::new());
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($constructor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn gamehub_plugin_abi_version() -> u32 {
            $crate::ffi::abi::ABI_VERSION
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn gamehub_plugin_create() -> *mut dyn $crate::loader::PluginPackage {
            let package: ::std::boxed::Box<dyn $crate::loader::PluginPackage> =
                ::std::boxed::Box::new($constructor);
            ::std::boxed::Box::into_raw(package)
        }
    };
}

/// Builds a startup export list.
///
/// # Example
/// ```rust,ignore
/// let exports = export_list![
///     "leaderboard_top" => { "cached": true },
///     "ping",
/// ];
/// ```
#[macro_export]
macro_rules! export_list {
    (@entry $hook:literal) => {
        $crate::prelude::json!({ "hook": $hook })
    };
    (@entry $hook:literal => $meta:tt) => {
        $crate::prelude::json!({ "hook": $hook, "meta": $meta })
    };
    () => {
        $crate::prelude::Value::Array(::std::vec::Vec::new())
    };
    ($($hook:literal $(=> $meta:tt)?),+ $(,)?) => {
        $crate::prelude::Value::Array(::std::vec![
            $(
                $crate::export_list!(@entry $hook $(=> $meta)?)
            ),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    #[test]
    fn test_export_list() {
        assert_eq!(export_list![], json!([]));
        assert_eq!(
            export_list!["leaderboard_top" => { "cached": true }, "ping"],
            json!([
                {"hook": "leaderboard_top", "meta": {"cached": true}},
                {"hook": "ping"}
            ])
        );
    }
}
