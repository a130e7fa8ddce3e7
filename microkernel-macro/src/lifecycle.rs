use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, ReturnType, Type};

struct LifecycleFn {
    name: String,
    ident: syn::Ident,
    returns_unit: bool,
}

/// `&Kernel` or any path ending in `Kernel`, taken by shared reference
fn is_kernel_ref(arg: &FnArg) -> bool {
    let FnArg::Typed(pat) = arg else {
        return false;
    };
    let Type::Reference(reference) = pat.ty.as_ref() else {
        return false;
    };
    if reference.mutability.is_some() {
        return false;
    }
    match reference.elem.as_ref() {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Kernel" && segment.arguments.is_empty()),
        _ => false,
    }
}

/// An `async fn(&self, &Kernel)` inside the impl block
fn extract_lifecycle_fn(method: &ImplItemFn) -> Option<LifecycleFn> {
    let sig = &method.sig;
    if sig.asyncness.is_none() || sig.inputs.len() != 2 {
        return None;
    }
    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return None,
    }
    if !inputs.next().is_some_and(is_kernel_ref) {
        return None;
    }
    Some(LifecycleFn {
        name: sig.ident.to_string(),
        ident: sig.ident.clone(),
        returns_unit: matches!(sig.output, ReturnType::Default),
    })
}

pub fn lifecycle_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    let expanded = generate_module_impl(input);
    TokenStream::from(expanded)
}

fn generate_module_impl(input: ItemImpl) -> TokenStream2 {
    let methods: Vec<LifecycleFn> = input
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(method) => extract_lifecycle_fn(method),
            _ => None,
        })
        .collect();

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let type_name = quote!(#self_ty).to_string();

    let names: Vec<&String> = methods.iter().map(|m| &m.name).collect();
    let provides = if names.is_empty() {
        quote! { false }
    } else {
        quote! { matches!(method, #(#names)|*) }
    };

    let arms = methods.iter().map(|m| {
        let name = &m.name;
        let ident = &m.ident;
        if m.returns_unit {
            quote! {
                #name => {
                    self.#ident(kernel).await;
                    Ok(())
                }
            }
        } else {
            quote! {
                #name => self.#ident(kernel).await.map_err(::core::convert::Into::into),
            }
        }
    });

    quote! {
        #input

        #[::microkernel::async_trait]
        impl #impl_generics ::microkernel::Module for #self_ty #where_clause {
            fn descriptor(&self) -> ::microkernel::ModuleDescriptor {
                <#self_ty>::manifest()
            }

            fn provides(&self, method: &str) -> bool {
                let _ = method;
                #provides
            }

            async fn call(
                &self,
                method: &str,
                kernel: &::microkernel::Kernel,
            ) -> ::microkernel::anyhow::Result<()> {
                let _ = kernel;
                match method {
                    #(#arms)*
                    _ => Err(::microkernel::anyhow::anyhow!(
                        "{} has no lifecycle method {}",
                        #type_name,
                        method
                    )),
                }
            }
        }
    }
}
