//! Export macro for plugin modules.

/// Export the ABI version symbol and the versioned entry point.
///
/// The argument is a constructor expression (a path or closure) producing
/// the plugin value. A panic during construction is trapped and reported to
/// the host as a failed create rather than unwinding across `extern "C"`.
///
/// Use this once per `cdylib`: the exported symbol names are fixed.
///
/// # Example
///
/// ```rust,ignore
/// use aaa_plugin_sdk::prelude::*;
///
/// export_aaa_plugin!(v2: Radius::from_default_config);
/// ```
#[macro_export]
macro_rules! export_aaa_plugin {
    (v2: $ctor:expr) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static aaa_plugin_api_version: $crate::abi::AbiVersionSymbol =
            $crate::abi::AbiVersionSymbol::new(2);

        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static aaa_plugin_v2: $crate::abi::PluginEntry =
            $crate::abi::PluginEntry::new(2, __aaa_plugin_create_v2);

        unsafe extern "C" fn __aaa_plugin_create_v2() -> *mut ::std::ffi::c_void {
            let built = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let plugin: ::std::boxed::Box<dyn $crate::AaaPluginV2> =
                    ::std::boxed::Box::new(($ctor)());
                plugin
            }));
            match built {
                Ok(plugin) => $crate::abi::into_raw_v2(plugin),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
    (v1: $ctor:expr) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static aaa_plugin_api_version: $crate::abi::AbiVersionSymbol =
            $crate::abi::AbiVersionSymbol::new(1);

        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static aaa_plugin_v1: $crate::abi::PluginEntry =
            $crate::abi::PluginEntry::new(1, __aaa_plugin_create_v1);

        unsafe extern "C" fn __aaa_plugin_create_v1() -> *mut ::std::ffi::c_void {
            let built = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let plugin: ::std::boxed::Box<dyn $crate::AaaPluginV1> =
                    ::std::boxed::Box::new(($ctor)());
                plugin
            }));
            match built {
                Ok(plugin) => $crate::abi::into_raw_v1(plugin),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}
