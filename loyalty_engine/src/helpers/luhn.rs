/// Checks a string of decimal digits against the Luhn (mod 10) checksum.
///
/// Starting from the rightmost digit (the check digit), every second digit is doubled, and 9 is subtracted from any
/// doubled value above 9. The number is valid when the sum of all digits is a multiple of 10.
///
/// Empty strings and strings containing anything other than ASCII digits are never valid.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}
