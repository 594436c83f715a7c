use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ExprLit, Lit, MetaNameValue, Result, Token};

/// Arguments of `#[filament::main(...)]` and `#[filament::test(...)]`.
#[derive(Default)]
pub(crate) struct RuntimeArgs {
    pub(crate) worker_threads: Option<usize>,
    pub(crate) stack_size: Option<usize>,
}

impl Parse for RuntimeArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = RuntimeArgs::default();

        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated(input)?;
        for pair in pairs {
            let value = positive(&pair.value)?;

            if pair.path.is_ident("worker_threads") {
                args.worker_threads = Some(value);
            } else if pair.path.is_ident("stack_size") {
                args.stack_size = Some(value);
            } else {
                return Err(Error::new_spanned(
                    &pair.path,
                    "unknown argument, expected `worker_threads` or `stack_size`",
                ));
            }
        }

        Ok(args)
    }
}

fn positive(value: &Expr) -> Result<usize> {
    let Expr::Lit(ExprLit {
        lit: Lit::Int(int), ..
    }) = value
    else {
        return Err(Error::new_spanned(value, "expected an integer literal"));
    };

    let n = int.base10_parse::<usize>()?;
    if n == 0 {
        return Err(Error::new_spanned(int, "value must be greater than zero"));
    }

    Ok(n)
}
