mod args;
use args::RuntimeArgs;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Error, ItemFn, parse_macro_input};

/// Runs `fn main` as a fiber on a fresh scheduler.
///
/// ```rust,ignore
/// #[filament::main(worker_threads = 4)]
/// fn main() {
///     filament::this_fiber::sleep_for(std::time::Duration::from_millis(10)).unwrap();
/// }
/// ```
///
/// `worker_threads` defaults to the hardware concurrency. A panic in the
/// body is re-raised on the main thread after the scheduler is joined. The
/// return value crosses threads, so it must be `Send`.
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.ident != "main" {
        return Error::new_spanned(&input.sig.ident, "#[filament::main] must be used on fn main")
            .to_compile_error()
            .into();
    }

    if let Err(err) = check_signature(&input, "#[filament::main]") {
        return err.to_compile_error().into();
    }

    let workers = match args.worker_threads {
        Some(n) => quote!(#n),
        None => quote!(::filament::Fiber::hardware_concurrency()),
    };

    expand(input, workers, args.stack_size, quote!()).into()
}

/// Runs a test body as a fiber on a fresh scheduler.
///
/// ```rust,ignore
/// #[filament::test(worker_threads = 2)]
/// fn sleeps() {
///     filament::this_fiber::sleep_for(std::time::Duration::from_millis(1)).unwrap();
/// }
/// ```
///
/// `worker_threads` defaults to one.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    if let Err(err) = check_signature(&input, "#[filament::test]") {
        return err.to_compile_error().into();
    }

    let workers = args.worker_threads.unwrap_or(1);

    expand(input, quote!(#workers), args.stack_size, quote!(#[::core::prelude::v1::test])).into()
}

fn check_signature(input: &ItemFn, name: &str) -> syn::Result<()> {
    let sig = &input.sig;

    if let Some(asyncness) = sig.asyncness {
        return Err(Error::new_spanned(
            asyncness,
            format!("{name} bodies run on a fiber and must not be async"),
        ));
    }

    if !sig.inputs.is_empty() {
        return Err(Error::new_spanned(
            &sig.inputs,
            format!("{name} functions take no arguments"),
        ));
    }

    Ok(())
}

fn expand(
    input: ItemFn,
    workers: TokenStream2,
    stack_size: Option<usize>,
    test_attr: TokenStream2,
) -> TokenStream2 {
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let output = &sig.output;
    let block = &input.block;

    let builder = match stack_size {
        Some(bytes) => quote!(::filament::Scheduler::builder().stack_size(#bytes)),
        None => quote!(::filament::Scheduler::builder()),
    };

    quote! {
        #test_attr
        #(#attrs)*
        #vis #sig {
            let __scheduler = #builder
                .build()
                .expect("failed to create the fiber scheduler");

            let (__tx, __rx) = ::std::sync::mpsc::channel();
            let mut __fiber = ::filament::fiber::Builder::new()
                .name("main")
                .scheduler(&__scheduler)
                .spawn(move || {
                    let __body = move || #output #block;
                    let _ = __tx.send(__body());
                })
                .expect("failed to spawn the main fiber");

            __scheduler
                .start(#workers)
                .expect("failed to start the fiber scheduler");

            let __joined = __fiber.join_propagate();
            __scheduler
                .join()
                .expect("failed to join the fiber scheduler");

            match __joined {
                ::core::result::Result::Ok(()) => {}
                ::core::result::Result::Err(::filament::Error::UserFailure(__panic)) => __panic.resume(),
                ::core::result::Result::Err(__err) => panic!("main fiber failed: {}", __err),
            }

            __rx.recv().expect("main fiber returned no value")
        }
    }
}
