use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Turn a function into a test with logging set up and ledger fixtures injected.
///
/// Injectable dependencies are the `Ledger`, the `ManualClock` driving it, and a
/// `RecordingObserver` subscribed to it, each taken by value and matched by type name.
///
/// By default the ledger has only been through genesis, with root `"root"`. With
/// `#[ledger_test(active)]` it also holds election `E1`, already started, with
/// position `P1`, candidates `C1` and `C2`, and registered voter `V1`.
#[proc_macro_attribute]
pub fn ledger_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let test_args = match check_sig(&item_fn.sig) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Pick the fixture.
    let fixture = match parse_macro_input!(args as Option<Ident>) {
        None => format_ident!("genesis"),
        Some(arg) if arg == "active" => format_ident!("active"),
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `active`")
                .into_compile_error()
                .into();
        }
    };

    // Rename the body so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_body", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["comitia_ledger"],
                None,
                None,
            );

            #[allow(unused_variables)]
            let crate::testing::Fixture { ledger, clock, events } =
                crate::testing::Fixture::#fixture();

            #new_name(#(#test_args),*);
        }
    }
    .into()
}

/// Ensure the wrapped test is synchronous, and map each parameter to a fixture.
fn check_sig(sig: &Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "Ledger tests are synchronous, remove `async`",
        ));
    }

    let mut seen = Vec::new();
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                let type_ident = type_path.path.segments.last().map(|s| s.ident.to_string());
                let fixture = match type_ident.as_deref() {
                    Some("Ledger") => Some(quote! { ledger }),
                    Some("ManualClock") => Some(quote! { clock }),
                    Some("RecordingObserver") => Some(quote! { events }),
                    _ => None,
                };
                if let (Some(fixture), Some(type_ident)) = (fixture, type_ident) {
                    if seen.contains(&type_ident) {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{type_ident}`"),
                        ));
                    }
                    seen.push(type_ident);
                    args.push(fixture);
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `ledger: Ledger`, `clock: ManualClock` or `events: RecordingObserver`",
        ));
    }

    Ok(args)
}
