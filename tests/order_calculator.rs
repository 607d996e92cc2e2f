use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use swap_marketmaker::market::orders::{Side, compute_buy_leg, compute_sell_leg};

const MIN_TRADABLE: Decimal = dec!(0.00038906);

#[test]
fn sell_leg_marks_the_rate_down_by_the_spread() {
    let leg = compute_sell_leg(dec!(5), dec!(0.1), "usdt", MIN_TRADABLE);

    assert_eq!(leg.side, Side::SellToken);
    assert_eq!(leg.exchange_rate, dec!(0.9));
    assert_eq!(leg.sell_amount, dec!(4.5));
    assert_eq!(leg.buy_amount, dec!(5));
    assert_eq!(leg.balance, dec!(5));
    assert_eq!(leg.sell_currency, "usdt");
    assert_eq!(leg.buy_currency, "btc");
}

#[test]
fn buy_leg_marks_the_rate_up_by_the_spread() {
    let leg = compute_buy_leg(dec!(1.5), dec!(0.1), "usdt", MIN_TRADABLE);

    assert_eq!(leg.side, Side::BuyToken);
    assert_eq!(leg.exchange_rate, dec!(1.1));
    assert_eq!(leg.buy_amount, dec!(1.65));
    assert_eq!(leg.sell_amount, dec!(1.5));
    assert_eq!(leg.balance, dec!(1.5));
    assert_eq!(leg.sell_currency, "btc");
    assert_eq!(leg.buy_currency, "usdt");
}

#[test]
fn legs_carry_fixed_flags_and_minimums() {
    for leg in [
        compute_sell_leg(dec!(10), dec!(0.25), "noxon", MIN_TRADABLE),
        compute_buy_leg(dec!(10), dec!(0.25), "noxon", MIN_TRADABLE),
    ] {
        assert!(leg.is_partial);
        assert!(leg.manual_rate);
        assert!(!leg.is_turbo);
        assert!(leg.is_sending);
        assert_eq!(leg.min_buy_amount, MIN_TRADABLE);
        assert_eq!(leg.min_sell_amount, MIN_TRADABLE);
    }
}

#[test]
fn spread_bounds_hold_across_the_range() {
    let hundred = dec!(100);
    let spreads = [dec!(0.01), dec!(0.05), dec!(0.1), dec!(0.25), dec!(0.5), dec!(0.9)];
    let balances = [dec!(0.00000001), dec!(0.5), dec!(1234.56789)];

    for spread in spreads {
        for balance in balances {
            let sell = compute_sell_leg(balance, spread, "usdt", MIN_TRADABLE);
            let expected_rate = (hundred - hundred * spread) / hundred;
            assert!(sell.sell_amount < balance);
            assert_eq!(sell.exchange_rate, expected_rate);
            assert_eq!(sell.sell_amount, balance * expected_rate);

            let buy = compute_buy_leg(balance, spread, "usdt", MIN_TRADABLE);
            let expected_rate = (hundred + hundred * spread) / hundred;
            assert!(buy.buy_amount > balance);
            assert_eq!(buy.exchange_rate, expected_rate);
            assert_eq!(buy.buy_amount, balance * expected_rate);
        }
    }
}
