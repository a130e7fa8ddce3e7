use proc_macro::TokenStream;

mod lifecycle;
mod module;

/// Attribute macro attaching a module descriptor to a struct
///
/// Generates an associated `fn manifest() -> ModuleDescriptor`. `name`
/// defaults to the lowercased type name; `tag`, `before` and `after` take a
/// single string or a list.
///
/// # Example
/// ```rust,ignore
/// use microkernel::module;
///
/// #[module(
///     name = "api",
///     group = "SERVICE",
///     tag = ["http", "public"],
///     after = "db",
/// )]
/// pub struct ApiModule;
///
/// assert_eq!(ApiModule::manifest().after, vec!["db"]);
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}

/// Attribute macro implementing `Module` from an impl block
///
/// Every `async fn` taking `(&self, &Kernel)` becomes the lifecycle method of
/// the same name. The type needs a `#[module]` descriptor.
///
/// # Example
/// ```rust,ignore
/// use microkernel::{lifecycle, module, Kernel, Module};
///
/// #[module(group = "RESOURCE")]
/// pub struct Database;
///
/// #[lifecycle]
/// impl Database {
///     async fn boot(&self, _kernel: &Kernel) -> anyhow::Result<()> {
///         Ok(())
///     }
///
///     async fn shutdown(&self, _kernel: &Kernel) {}
/// }
///
/// assert!(Database.provides("boot"));
/// assert!(!Database.provides("start"));
/// ```
#[proc_macro_attribute]
pub fn lifecycle(attr: TokenStream, item: TokenStream) -> TokenStream {
    lifecycle::lifecycle_attribute(attr, item)
}
