use rust_decimal::Decimal;

use interface::Quote;

use crate::error::InvalidQuoteError;

/// 스프레드 = best ask - best bid.
/// 호가가 한쪽이라도 없거나 ask < bid (crossed book) 이면 오류
pub fn spread(quote: &Quote) -> Result<Decimal, InvalidQuoteError> {
    let bid = quote.best_bid.ok_or_else(|| InvalidQuoteError::MissingSide {
        symbol: quote.symbol.clone(),
        side: "bid",
    })?;
    let ask = quote.best_ask.ok_or_else(|| InvalidQuoteError::MissingSide {
        symbol: quote.symbol.clone(),
        side: "ask",
    })?;

    if ask < bid {
        return Err(InvalidQuoteError::Crossed {
            symbol: quote.symbol.clone(),
            bid,
            ask,
        });
    }

    Ok(ask - bid)
}
