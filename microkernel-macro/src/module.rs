use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, Ident, ItemStruct,
    LitStr, Token,
};

/// Either `key = "one"` or `key = ["one", "two"]`
fn parse_strings(input: ParseStream) -> syn::Result<Vec<LitStr>> {
    if input.peek(syn::token::Bracket) {
        let content;
        syn::bracketed!(content in input);
        let items: Punctuated<LitStr, Token![,]> =
            content.parse_terminated(<LitStr as Parse>::parse, Token![,])?;
        Ok(items.into_iter().collect())
    } else {
        Ok(vec![input.parse()?])
    }
}

#[derive(Default)]
struct ModuleArgs {
    name: Option<LitStr>,
    group: Option<LitStr>,
    tags: Vec<LitStr>,
    before: Vec<LitStr>,
    after: Vec<LitStr>,
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ModuleArgs::default();

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            if key == "name" {
                args.name = Some(input.parse()?);
            } else if key == "group" {
                args.group = Some(input.parse()?);
            } else if key == "tag" || key == "tags" {
                args.tags.extend(parse_strings(input)?);
            } else if key == "before" {
                args.before.extend(parse_strings(input)?);
            } else if key == "after" {
                args.after.extend(parse_strings(input)?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown module attribute `{}`", key),
                ));
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

pub fn module_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ModuleArgs);
    let input = parse_macro_input!(item as ItemStruct);
    let expanded = generate_manifest(&args, &input);

    TokenStream::from(expanded)
}

fn generate_manifest(args: &ModuleArgs, input: &ItemStruct) -> TokenStream2 {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = match &args.name {
        Some(name) => quote! { #name },
        None => {
            let default = ident.to_string().to_lowercase();
            quote! { #default }
        }
    };
    let group = args.group.iter();
    let tags = &args.tags;
    let before = &args.before;
    let after = &args.after;

    quote! {
        #input

        impl #impl_generics #ident #ty_generics #where_clause {
            /// Descriptor declared with `#[module]`
            pub fn manifest() -> ::microkernel::ModuleDescriptor {
                ::microkernel::ModuleDescriptor::new(#name)
                    #(.group(#group))*
                    #(.tag(#tags))*
                    #(.before(#before))*
                    #(.after(#after))*
            }
        }
    }
}
