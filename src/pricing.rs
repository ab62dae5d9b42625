use crate::models::order::{PackageSize, PriceBreakdown};

const WEIGHT_CHARGE_PER_KG: f64 = 10.0;
const DISTANCE_CHARGE_PER_KM: f64 = 5.0;
const EXPRESS_SURCHARGE: f64 = 50.0;
const SCHEDULED_SURCHARGE: f64 = 20.0;
const RETURN_SURCHARGE: f64 = 30.0;
const DISCOUNT_PERCENT: u32 = 10;

fn base_fare(size: PackageSize) -> f64 {
    match size {
        PackageSize::Small => 50.0,
        PackageSize::Medium => 80.0,
        PackageSize::Large => 120.0,
    }
}

/// Full fare breakdown for an order. The flat discount applies to the whole
/// subtotal and the total is rounded up to the next whole unit.
pub fn compute_price(
    size: PackageSize,
    weight_kg: f64,
    distance_km: f64,
    express: bool,
    scheduled: bool,
    return_delivery: bool,
) -> PriceBreakdown {
    let base = base_fare(size);
    let weight_charge = weight_kg.max(0.0) * WEIGHT_CHARGE_PER_KG;
    let distance_charge = distance_km.max(0.0) * DISTANCE_CHARGE_PER_KM;
    let express_surcharge = if express { EXPRESS_SURCHARGE } else { 0.0 };
    let scheduled_surcharge = if scheduled { SCHEDULED_SURCHARGE } else { 0.0 };
    let return_surcharge = if return_delivery { RETURN_SURCHARGE } else { 0.0 };

    let subtotal = base
        + weight_charge
        + distance_charge
        + express_surcharge
        + scheduled_surcharge
        + return_surcharge;
    let discounted = subtotal * (100 - DISCOUNT_PERCENT) as f64 / 100.0;

    PriceBreakdown {
        base_fare: base,
        weight_charge,
        distance_charge,
        express_surcharge,
        scheduled_surcharge,
        return_surcharge,
        discount_percent: DISCOUNT_PERCENT,
        total: discounted.ceil() as u32,
    }
}
