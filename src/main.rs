use loancalc::loan::Loan;
use log::warn;
use simple_logger::SimpleLogger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    println!("\nCurrent house loan: ");
    let house_loan = Loan::new(0.029, 30, 554000., Some("2020-10-01"))?;
    println!("My monthly loan payment is: {:.2}.", house_loan.payment()?);
    match house_loan.remaining_balance() {
        Ok(balance) => println!("My current loan balance is: {}", balance),
        Err(err) => warn!("Loan balance is not available: {}", err),
    }

    println!("\n---------------------------------------\n");

    let quotes = [
        ("House in Texas, 200k note, 30 years", 0.036, 30, 200000.),
        ("House in Texas, 200k note, 15 years", 0.0285, 15, 200000.),
        ("House in Texas, 100k note, 30 years", 0.036, 30, 100000.),
        ("House in Texas, 100k note, 15 years", 0.0285, 15, 100000.),
        ("Loan on a Volvo XC-90, 25k, 4 years", 0.055, 4, 25000.),
    ];
    for (label, rate, years, principal) in quotes {
        let loan = Loan::new(rate, years, principal, None)?;
        println!("\n{}: ", label);
        println!("My monthly loan payment is: {:.2}.", loan.payment()?);
    }

    Ok(())
}
